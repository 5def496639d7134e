//! The dispatch loop: drives every script's hooks over every record source.
//!
//! Sources are processed strictly one after another. Within a source the
//! hook order is fixed: `begin` for every script, then `each` per record in
//! source order, then `finish` for every script. Within each phase scripts
//! run in registry order. A termination signal stops the loop at the
//! next safe point and skips the interrupted source's `finish`.

use tracing::debug;

use crate::cancel::CancelController;
use crate::capture::{PcapFileSource, RecordSource};
use crate::error::Result;
use crate::script::{hooks, HookArg, ScriptEnv, ScriptRegistry};

/// How a whole run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled(i32),
}

/// How a single source ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Completed,
    Cancelled(i32),
}

/// Drives a registry of scripts over record sources.
pub struct DispatchLoop<'a> {
    registry: &'a mut ScriptRegistry,
    env: &'a ScriptEnv,
    cancel: &'a mut CancelController,
}

impl<'a> DispatchLoop<'a> {
    pub fn new(
        registry: &'a mut ScriptRegistry,
        env: &'a ScriptEnv,
        cancel: &'a mut CancelController,
    ) -> Self {
        Self {
            registry,
            env,
            cancel,
        }
    }

    /// Process the given capture files in order, applying `filter` to each
    /// before its first record is read.
    pub fn run(&mut self, captures: &[String], filter: Option<&str>) -> Result<Outcome> {
        for path in captures {
            if let Some(signum) = self.cancel.poll() {
                self.unwind();
                return Ok(Outcome::Cancelled(signum));
            }

            debug!(capture = %path, "opening capture");
            let mut source = PcapFileSource::open(path, filter)?;

            if let SourceStatus::Cancelled(signum) = self.run_source(&mut source)? {
                self.unwind();
                return Ok(Outcome::Cancelled(signum));
            }
        }

        Ok(Outcome::Completed)
    }

    /// Dispatch one source: evaluate not-yet-ready scripts, bracket the
    /// records with `begin`/`finish`, and call `each` once per record with a
    /// 1-based sequence number scoped to this source.
    pub fn run_source(&mut self, source: &mut dyn RecordSource) -> Result<SourceStatus> {
        // Payloads run lazily, here, so source metadata exists before the
        // first `begin`. Evaluation happens exactly once per instance.
        for script in self.registry.iter_mut() {
            if !script.is_ready() {
                script.prepare(self.env)?;
                script.evaluate()?;
            }
        }

        let link_type = source.link_type();
        for script in self.registry.iter() {
            if let Some(func) = hooks::lookup(script, hooks::BEGIN)? {
                hooks::invoke(
                    script,
                    hooks::BEGIN,
                    &func,
                    &[HookArg::Str(source.name()), HookArg::Str(&link_type)],
                )?;
            }
        }

        let mut index: i64 = 0;
        loop {
            if let Some(signum) = self.cancel.poll() {
                return Ok(SourceStatus::Cancelled(signum));
            }

            let record = match source.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    // A read aborted by a termination signal is
                    // cancellation, not an I/O failure.
                    if let Some(signum) = self.cancel.poll() {
                        return Ok(SourceStatus::Cancelled(signum));
                    }
                    return Err(e);
                }
            };
            index += 1;

            for script in self.registry.iter_mut() {
                if script.each_missing() {
                    continue;
                }
                match hooks::lookup(script, hooks::EACH)? {
                    Some(func) => hooks::invoke(
                        script,
                        hooks::EACH,
                        &func,
                        &[
                            HookArg::Bytes(&record.data),
                            HookArg::Number(record.timestamp),
                            HookArg::Int(index),
                        ],
                    )?,
                    None => script.mark_each_missing(),
                }
            }
        }

        debug!(source = %source.name(), records = index, "source exhausted");

        for script in self.registry.iter() {
            if let Some(func) = hooks::lookup(script, hooks::FINISH)? {
                hooks::invoke(script, hooks::FINISH, &func, &[])?;
            }
        }

        Ok(SourceStatus::Completed)
    }

    /// Discard in-flight interpreter state after a cancellation, before any
    /// `sigaction` hook runs.
    pub fn unwind(&mut self) {
        for script in self.registry.iter() {
            script.unwind();
        }
        self.cancel.mark_unwound();
    }
}
