//! Values scripts are entitled to read before their payload runs.

use std::io;
use std::os::unix::io::AsRawFd;

use nix::sys::stat::{fstat, SFlag};

/// Host environment injected into every script prior to evaluation.
#[derive(Debug, Clone)]
pub struct ScriptEnv {
    /// Arguments passed through to scripts, exposed as `arg[1..]`.
    pub args: Vec<String>,
    /// Semantic version of this tool.
    pub version: String,
    /// Operating system name.
    pub platform: String,
    /// What the process's standard output is connected to.
    pub output: String,
}

impl ScriptEnv {
    /// Capture the current process environment.
    pub fn detect(args: Vec<String>) -> Self {
        Self {
            args,
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            output: output_stream_kind().to_string(),
        }
    }
}

/// Classify the stream standard output is connected to.
pub fn output_stream_kind() -> &'static str {
    let fd = io::stdout().as_raw_fd();

    match fstat(fd) {
        Ok(stat) => match stat.st_mode & SFlag::S_IFMT.bits() {
            m if m == SFlag::S_IFREG.bits() => "file",
            m if m == SFlag::S_IFCHR.bits() => "character device",
            m if m == SFlag::S_IFIFO.bits() => "pipe",
            m if m == SFlag::S_IFSOCK.bits() => "socket",
            _ => "unknown",
        },
        Err(_) => "unknown",
    }
}
