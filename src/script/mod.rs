//! Script runtime: interpreter instances, the ordered registry, hook
//! lookup/invocation and the values injected into every script.
//!
//! - `ScriptInstance`: one embedded Lua state plus its payload
//! - `ScriptRegistry`: insertion-ordered collection, owns the instances
//! - `hooks`: discovery and invocation of the well-known hook functions
//! - `ScriptEnv`: argument vector and host identifiers scripts may read

pub mod env;
pub mod hooks;
mod instance;
mod registry;

pub use env::ScriptEnv;
pub use hooks::HookArg;
pub use instance::{PayloadKind, ScriptInstance, ScriptPayload};
pub use registry::ScriptRegistry;
