//! Run Lua scripts over packet capture files.
//!
//! Scripts expose optional hook functions (`begin`, `each`, `finish`,
//! `sigaction`), either as globals or in a table the script returns. The
//! dispatch loop calls them in a fixed order over every configured capture:
//! `begin(source, linktype)` before the first record, `each(bytes,
//! timestamp, index)` once per record, `finish()` after the last one, and
//! `sigaction(signum)` once if the process is interrupted.

pub mod cancel;
pub mod capture;
pub mod dispatch;
pub mod error;
pub mod script;

pub use error::{Error, Result};

use cancel::CancelController;
use dispatch::{DispatchLoop, Outcome};
use script::{ScriptEnv, ScriptInstance, ScriptPayload, ScriptRegistry};

/// Run every payload over every capture file and return the process exit
/// code: 0 on completion, the signal number on cancellation. Fatal errors
/// are returned; the registry (and with it every interpreter) is released
/// on all paths.
pub fn run(
    payloads: Vec<ScriptPayload>,
    captures: &[String],
    filter: Option<&str>,
    script_args: Vec<String>,
) -> Result<i32> {
    let env = ScriptEnv::detect(script_args);

    let mut registry = ScriptRegistry::new();
    for payload in payloads {
        registry.push(ScriptInstance::new(payload));
    }

    let mut cancel = CancelController::install()?;

    let outcome = DispatchLoop::new(&mut registry, &env, &mut cancel).run(captures, filter)?;

    match outcome {
        Outcome::Completed => Ok(0),
        Outcome::Cancelled(_) => Ok(cancel.terminate(&registry)),
    }
}
