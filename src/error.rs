//! Error taxonomy for the capture/script pipeline.
//!
//! Every variant is fatal for the run: there is no retry or local recovery
//! anywhere, only cleanup. Script teardown still happens on the failure path
//! because instances release their interpreter on drop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot allocate interpreter memory: {0}")]
    Allocation(String),

    #[error("cannot load script {name}: {message}")]
    Evaluation { name: String, message: String },

    #[error("cannot execute '{hook}' method: {message}")]
    Hook { hook: String, message: String },

    #[error("interpreter stack overflow")]
    StackOverflow,

    #[error("cannot open capture '{path}': {message}")]
    CaptureOpen { path: String, message: String },

    #[error("cannot apply filter to capture '{path}': {message}")]
    Filter { path: String, message: String },

    #[error("reading a record from capture '{path}' failed: {message}")]
    CaptureRead { path: String, message: String },

    #[error("cannot install signal handler: {0}")]
    SignalInstall(std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map an engine failure raised while loading or preparing a script.
    ///
    /// Memory and stack exhaustion keep their own variants; everything else
    /// is an evaluation failure carrying the engine's diagnostic text.
    pub(crate) fn evaluation(script: &str, err: mlua::Error) -> Self {
        match err {
            mlua::Error::MemoryError(message) => Error::Allocation(message),
            mlua::Error::StackError => Error::StackOverflow,
            other => Error::Evaluation {
                name: script.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Map an engine failure raised while looking up or calling a hook.
    pub(crate) fn hook(hook: &str, err: mlua::Error) -> Self {
        match err {
            mlua::Error::MemoryError(message) => Error::Allocation(message),
            mlua::Error::StackError => Error::StackOverflow,
            other => Error::Hook {
                hook: hook.to_string(),
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
