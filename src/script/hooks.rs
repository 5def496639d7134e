//! Hook discovery and invocation.
//!
//! A hook is an optional callable in a script's namespace; absence is never
//! an error. Lookup and invocation are split so the dispatch loop can skip
//! argument marshalling entirely when a hook is cached as missing.

use mlua::{Function, MultiValue, Value};

use crate::error::{Error, Result};
use crate::script::instance::ScriptInstance;

/// Called once per record source, before its first record.
pub const BEGIN: &str = "begin";
/// Called once per record.
pub const EACH: &str = "each";
/// Called once per record source, after its last record.
pub const FINISH: &str = "finish";
/// Called at most once per process, on a termination signal.
pub const SIGACTION: &str = "sigaction";

/// A primitive argument marshalled onto the interpreter stack.
#[derive(Debug, Clone, Copy)]
pub enum HookArg<'a> {
    Bytes(&'a [u8]),
    Str(&'a str),
    Number(f64),
    Int(i64),
}

/// Search the script's namespace for a callable named `name`.
///
/// Returns `None` when the value is absent or not callable.
pub fn lookup(script: &ScriptInstance, name: &str) -> Result<Option<Function>> {
    let namespace = script.namespace()?;
    match namespace.get::<Value>(name) {
        Ok(Value::Function(func)) => Ok(Some(func)),
        Ok(_) => Ok(None),
        Err(e) => Err(Error::hook(name, e)),
    }
}

/// Call a resolved hook with `args` pushed left to right and no expected
/// return values. Engine failures map into the fatal taxonomy; the engine
/// checks stack headroom on every push, so exhaustion surfaces here rather
/// than corrupting the call.
pub fn invoke(
    script: &ScriptInstance,
    name: &str,
    func: &Function,
    args: &[HookArg<'_>],
) -> Result<()> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        let value = match arg {
            HookArg::Bytes(bytes) => Value::String(
                script
                    .lua()
                    .create_string(bytes)
                    .map_err(|e| Error::hook(name, e))?,
            ),
            HookArg::Str(s) => Value::String(
                script
                    .lua()
                    .create_string(s)
                    .map_err(|e| Error::hook(name, e))?,
            ),
            HookArg::Number(n) => Value::Number(*n),
            HookArg::Int(i) => Value::Integer(*i),
        };
        values.push(value);
    }

    func.call::<()>(MultiValue::from_iter(values))
        .map_err(|e| Error::hook(name, e))
}
