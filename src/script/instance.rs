//! One embedded interpreter state plus the payload that produced it.

use std::fs;
use std::path::Path;

use mlua::{Function, Lua, RegistryKey, Table, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::script::env::ScriptEnv;

/// How a script payload should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Literal source code given on the command line.
    Inline,
    /// Path of a script file.
    File,
    /// Name resolved through Lua's module mechanism.
    Module,
}

/// A script payload as requested by the operator.
#[derive(Debug, Clone)]
pub struct ScriptPayload {
    pub kind: PayloadKind,
    pub text: String,
}

impl ScriptPayload {
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Inline,
            text: text.into(),
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::File,
            text: path.into(),
        }
    }

    pub fn module(name: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Module,
            text: name.into(),
        }
    }

    /// Display name, also used as `arg[0]` and in diagnostics.
    pub fn name(&self) -> &str {
        match self.kind {
            PayloadKind::Inline => "(inline)",
            _ => &self.text,
        }
    }
}

/// Where hooks are looked up for one script.
enum Namespace {
    /// The global scope; used when the payload did not return a table.
    Globals,
    /// The table the payload returned, pinned in the interpreter registry.
    Table(RegistryKey),
}

/// One script: an exclusively-owned Lua state, its payload, and the
/// hook-miss cache. The state lives as long as the instance and is released
/// on drop, on every exit path.
pub struct ScriptInstance {
    lua: Lua,
    payload: ScriptPayload,
    namespace: Namespace,
    ready: bool,
    each_missing: bool,
}

impl ScriptInstance {
    /// Allocate a fresh interpreter for `payload` without evaluating it.
    pub fn new(payload: ScriptPayload) -> Self {
        Self {
            lua: Lua::new(),
            payload,
            namespace: Namespace::Globals,
            ready: false,
            each_missing: false,
        }
    }

    pub fn payload(&self) -> &ScriptPayload {
        &self.payload
    }

    pub fn name(&self) -> &str {
        self.payload.name()
    }

    /// True once the payload has been evaluated.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// True once `each` was found missing; the instance is then excluded
    /// from all further `each` dispatch for the rest of the run.
    pub fn each_missing(&self) -> bool {
        self.each_missing
    }

    pub fn mark_each_missing(&mut self) {
        debug!(script = %self.name(), "no 'each' method, excluding from record dispatch");
        self.each_missing = true;
    }

    /// The underlying interpreter. Exclusively owned by this instance; the
    /// borrow never outlives it.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Inject the values the script may read: the `arg` vector (0-indexed,
    /// `arg[0]` is the payload's own name) and the `luacap` table with
    /// `version`, `platform` and `output`. Must run before `evaluate`.
    pub fn prepare(&mut self, env: &ScriptEnv) -> Result<()> {
        self.inject(env)
            .map_err(|e| Error::evaluation(self.payload.name(), e))
    }

    fn inject(&self, env: &ScriptEnv) -> mlua::Result<()> {
        let globals = self.lua.globals();

        let arg = self.lua.create_table()?;
        arg.set(0, self.payload.name())?;
        for (i, value) in env.args.iter().enumerate() {
            arg.set(i as i64 + 1, value.as_str())?;
        }
        globals.set("arg", arg)?;

        let host = self.lua.create_table()?;
        host.set("version", env.version.as_str())?;
        host.set("platform", env.platform.as_str())?;
        host.set("output", env.output.as_str())?;
        globals.set("luacap", host)?;

        Ok(())
    }

    /// Run the payload, exactly once. A file payload whose path does not
    /// name a readable file falls back to module resolution. If evaluation
    /// yields a table, that table becomes the namespace hooks are looked up
    /// in; otherwise the global scope is.
    pub fn evaluate(&mut self) -> Result<()> {
        let result = match self.payload.kind {
            PayloadKind::Inline => self
                .lua
                .load(self.payload.text.as_str())
                .set_name("=(inline)")
                .eval::<Value>(),
            PayloadKind::File => {
                let path = Path::new(&self.payload.text);
                if path.is_file() {
                    match fs::read_to_string(path) {
                        Ok(source) => self
                            .lua
                            .load(source)
                            .set_name(format!("@{}", self.payload.text))
                            .eval::<Value>(),
                        Err(e) => {
                            return Err(Error::Evaluation {
                                name: self.payload.text.clone(),
                                message: e.to_string(),
                            })
                        }
                    }
                } else {
                    debug!(
                        payload = %self.payload.text,
                        "not a file, resolving as module name"
                    );
                    self.require_module()
                }
            }
            PayloadKind::Module => self.require_module(),
        };

        let value = result.map_err(|e| Error::evaluation(self.payload.name(), e))?;

        if let Value::Table(table) = value {
            let key = self
                .lua
                .create_registry_value(table)
                .map_err(|e| Error::evaluation(self.payload.name(), e))?;
            self.namespace = Namespace::Table(key);
        } else {
            self.namespace = Namespace::Globals;
        }

        self.ready = true;
        Ok(())
    }

    fn require_module(&self) -> mlua::Result<Value> {
        let require: Function = self.lua.globals().get("require")?;
        require.call::<Value>(self.payload.text.as_str())
    }

    /// The table hooks are searched in.
    pub fn namespace(&self) -> Result<Table> {
        match &self.namespace {
            Namespace::Globals => Ok(self.lua.globals()),
            Namespace::Table(key) => self
                .lua
                .registry_value::<Table>(key)
                .map_err(|e| Error::evaluation(self.payload.name(), e)),
        }
    }

    /// Discard in-flight evaluation state after a cancelled dispatch.
    ///
    /// Protected calls unwind stack-balanced, so this only has to collect
    /// whatever transient values the aborted iteration left behind.
    pub fn unwind(&self) {
        if let Err(e) = self.lua.gc_collect() {
            debug!(script = %self.name(), error = %e, "collect after unwind failed");
        }
    }
}
