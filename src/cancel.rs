//! Cancellation on termination signals.
//!
//! The handler is async-signal-safe: it only records the first delivered
//! signal into a process-wide atomic. Stopping the dispatch loop, unwinding
//! interpreter state and running the `sigaction` hook all happen
//! cooperatively on the one logical thread, driven by the state machine
//! below.

use std::sync::atomic::{AtomicI32, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::script::{hooks, HookArg, ScriptRegistry};

/// First termination signal delivered to the process; 0 while none has
/// arrived. Written once by the handler, read-only afterwards.
static PENDING_SIGNAL: AtomicI32 = AtomicI32::new(0);

extern "C" fn record_signal(signum: libc::c_int) {
    // Only the first signal wins; later deliveries are ignored.
    let _ = PENDING_SIGNAL.compare_exchange(0, signum, Ordering::SeqCst, Ordering::SeqCst);
}

/// Lifecycle of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    /// No termination signal seen.
    Running,
    /// A signal arrived; the dispatch loop must stop at the next safe point.
    CancelRequested(i32),
    /// Interpreter state has been discarded; no further hooks except
    /// `sigaction` may run.
    Unwound(i32),
    /// The `sigaction` hook has had its chance; the exit code is decided.
    Terminated(i32),
}

/// Tracks cancellation for one run.
pub struct CancelController {
    state: CancelState,
}

impl CancelController {
    /// A controller that only polls; no handlers are installed.
    pub fn new() -> Self {
        Self {
            state: CancelState::Running,
        }
    }

    /// Install handlers for interrupt and terminate and return a controller.
    ///
    /// SA_RESTART is deliberately not set, so a blocking read returns early
    /// when a signal lands; the dispatch loop re-checks the flag before
    /// treating such a read failure as fatal.
    pub fn install() -> Result<Self> {
        let action = SigAction::new(
            SigHandler::Handler(record_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );

        for signal in [Signal::SIGINT, Signal::SIGTERM] {
            // The handler only touches an atomic.
            unsafe { sigaction(signal, &action) }.map_err(|errno| {
                Error::SignalInstall(std::io::Error::from_raw_os_error(errno as i32))
            })?;
        }

        Ok(Self::new())
    }

    pub fn state(&self) -> CancelState {
        self.state
    }

    /// Cooperative check. Returns the signal number once a termination
    /// signal has been recorded; the answer never reverts.
    pub fn poll(&mut self) -> Option<i32> {
        match self.state {
            CancelState::Running => {
                let signum = PENDING_SIGNAL.load(Ordering::SeqCst);
                if signum == 0 {
                    return None;
                }
                debug!(signal = signum, "termination signal received");
                self.state = CancelState::CancelRequested(signum);
                Some(signum)
            }
            CancelState::CancelRequested(signum)
            | CancelState::Unwound(signum)
            | CancelState::Terminated(signum) => Some(signum),
        }
    }

    /// Record that every instance's evaluation state has been discarded.
    pub fn mark_unwound(&mut self) {
        if let CancelState::CancelRequested(signum) = self.state {
            self.state = CancelState::Unwound(signum);
        }
    }

    /// Give the primary script its `sigaction(signum)` call, at most once per
    /// process, and return the exit code (the signal number). A failure in
    /// the hook is reported but the exit code stays decided.
    pub fn terminate(&mut self, registry: &ScriptRegistry) -> i32 {
        let signum = match self.state {
            CancelState::Running => return 0,
            CancelState::Terminated(signum) => return signum,
            CancelState::CancelRequested(signum) | CancelState::Unwound(signum) => signum,
        };
        self.state = CancelState::Terminated(signum);

        if let Some(primary) = registry.primary() {
            match hooks::lookup(primary, hooks::SIGACTION) {
                Ok(Some(func)) => {
                    if let Err(e) = hooks::invoke(
                        primary,
                        hooks::SIGACTION,
                        &func,
                        &[HookArg::Int(i64::from(signum))],
                    ) {
                        error!("{e}");
                    }
                }
                Ok(None) => {}
                Err(e) => error!("{e}"),
            }
        }

        signum
    }
}

impl Default for CancelController {
    fn default() -> Self {
        Self::new()
    }
}
