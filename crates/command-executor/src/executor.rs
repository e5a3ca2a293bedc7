//! Process lifecycle driver
//!
//! [`Executor::run`] spawns a [`Command`], then (unless the command is in
//! serve mode) waits for the process to exit and for its captured output to
//! drain, each wait bounded by the command's timeouts.

use crate::command::Command;
use crate::error::{Error, Result, TimeoutPhase};
use crate::process::ExitStatus;
use crate::run_result::RunResult;
use async_io::Timer;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Interval for the polling fallbacks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Launches commands and drives them through their lifecycle
#[derive(Debug, Clone)]
pub struct Executor {
    /// The service name for logging/identification
    service_name: String,
    poll_interval: Duration,
}

enum Wait {
    Exited(io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

impl Executor {
    /// Create a new executor
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the polling interval used for output draining and the exit fallback
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Get the service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Check that `path` points at an executable file
    pub fn ensure_executable(path: &Path) -> Result<()> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ExecutableNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(Error::NotExecutable {
                path: path.to_path_buf(),
            });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(Error::NotExecutable {
                    path: path.to_path_buf(),
                });
            }
        }

        Ok(())
    }

    /// Start `command` and, unless it is in serve mode, run it to completion
    ///
    /// A non-zero exit code is not an error here; callers inspect
    /// [`RunResult::exit_status`].
    pub async fn run(&self, command: &Command) -> Result<RunResult> {
        let child = command
            .prepare()
            .spawn()
            .map_err(|e| spawn_error(command, e))?;

        let mut result = RunResult::start(child, command.display_name(), command.event_sink());
        info!(
            "[{}] Started {} (pid {})",
            self.service_name,
            result.name(),
            result.pid()
        );
        debug!("[{}] Command line: {}", self.service_name, command.command_line());

        if !command.waits_for_exit() {
            return Ok(result);
        }

        let status = match self.wait_for_exit(&mut result, command).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    "[{}] Killing {} (pid {}): {}",
                    self.service_name,
                    result.name(),
                    result.pid(),
                    e
                );
                result.kill_now();
                return Err(e);
            }
        };

        self.drain_output(&result, command).await?;
        result.finalize(status);

        info!(
            "[{}] {} (pid {}) finished with {}",
            self.service_name,
            result.name(),
            result.pid(),
            status
        );
        Ok(result)
    }

    async fn wait_for_exit(&self, result: &mut RunResult, command: &Command) -> Result<ExitStatus> {
        let pid = result.pid();
        let limit = command.execution_timeout();
        let deadline = limit.map(|limit| Instant::now() + limit);
        let cancel = command.cancel_signal().cloned();

        let outcome = {
            let exit = result.child_mut()?.status();
            let exited = async { Wait::Exited(exit.await) };
            let timed_out = async {
                match deadline {
                    Some(deadline) => {
                        Timer::at(deadline).await;
                        Wait::TimedOut
                    }
                    None => futures_lite::future::pending().await,
                }
            };
            let cancelled = async {
                match &cancel {
                    Some(signal) => {
                        signal.cancelled().await;
                        Wait::Cancelled
                    }
                    None => futures_lite::future::pending().await,
                }
            };
            futures_lite::future::or(exited, futures_lite::future::or(timed_out, cancelled)).await
        };

        let timeout = |limit: Duration| Error::Timeout {
            phase: TimeoutPhase::Execution,
            limit,
            pid,
        };

        match outcome {
            Wait::Exited(Ok(status)) => Ok(status.into()),
            Wait::TimedOut => Err(timeout(limit.unwrap_or_default())),
            Wait::Cancelled => Err(Error::Cancelled),
            Wait::Exited(Err(e)) => {
                debug!(
                    "[{}] Exit notification for pid {} failed ({}), polling instead",
                    self.service_name, pid, e
                );
                loop {
                    match result.poll_exit() {
                        Ok(Some(status)) => return Ok(status),
                        Ok(None) => {}
                        Err(e) => debug!("[{}] Exit query for pid {} failed: {}", self.service_name, pid, e),
                    }
                    if cancel.as_ref().is_some_and(|signal| signal.is_cancelled()) {
                        return Err(Error::Cancelled);
                    }
                    if let (Some(deadline), Some(limit)) = (deadline, limit) {
                        if Instant::now() >= deadline {
                            return Err(timeout(limit));
                        }
                    }
                    Timer::after(self.poll_interval).await;
                }
            }
        }
    }

    async fn drain_output(&self, result: &RunResult, command: &Command) -> Result<()> {
        let started = Instant::now();
        while result.has_pending_data() {
            if let Some(limit) = command.termination_timeout() {
                if started.elapsed() >= limit {
                    return Err(Error::Timeout {
                        phase: TimeoutPhase::Termination,
                        limit,
                        pid: result.pid(),
                    });
                }
            }
            if command.cancel_signal().is_some_and(|signal| signal.is_cancelled()) {
                return Err(Error::Cancelled);
            }
            Timer::after(self.poll_interval).await;
        }
        Ok(())
    }
}

fn spawn_error(command: &Command, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        return Error::CommandNotFound {
            command: command.get_program().display().to_string(),
        };
    }
    let detail = e.to_string();
    if detail.is_empty() {
        Error::spawn_failed(format!("Unknown process start error: {}", command.display_name()))
    } else {
        Error::spawn_failed(format!("{}: {}", command.display_name(), detail))
    }
}
