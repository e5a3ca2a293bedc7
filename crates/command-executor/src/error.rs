//! Error types for command execution

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Which wait of the process lifecycle ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// Waiting for the process to exit
    Execution,
    /// Waiting for captured output to finish draining after exit
    Termination,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Execution => f.write_str("execution"),
            TimeoutPhase::Termination => f.write_str("termination"),
        }
    }
}

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// Command not found by the operating system
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found
        command: String,
    },

    /// Executable file does not exist
    #[error("executable not found at '{}'", path.display())]
    ExecutableNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// Path exists but cannot be executed
    #[error("'{}' is not an executable file", path.display())]
    NotExecutable {
        /// Path that was checked
        path: PathBuf,
    },

    /// A lifecycle wait exceeded its bound
    #[error("process {pid} exceeded the {phase} timeout of {limit:?}")]
    Timeout {
        /// The wait that timed out
        phase: TimeoutPhase,
        /// The configured bound
        limit: Duration,
        /// Process that was being waited on
        pid: u32,
    },

    /// The wait was abandoned through a cancellation signal
    #[error("operation was cancelled")]
    Cancelled,

    /// No running process has the given ID
    #[error("no process with id {pid}")]
    ProcessNotFound {
        /// The process ID that was looked up
        pid: u32,
    },

    /// Failed to send signal to process
    #[error("failed to send signal {signal}: {reason}")]
    SignalFailed {
        /// The signal number that failed to send
        signal: i32,
        /// The reason for the signal failure
        reason: String,
    },

    /// Operation not available on this platform
    #[error("{operation} is not supported on this platform")]
    Unsupported {
        /// The operation that was attempted
        operation: &'static str,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create a signal failed error
    pub fn signal_failed(signal: i32, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            signal,
            reason: reason.into(),
        }
    }

    /// Returns true for either lifecycle timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_phase() {
        let err = Error::Timeout {
            phase: TimeoutPhase::Termination,
            limit: Duration::from_millis(250),
            pid: 42,
        };
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "process 42 exceeded the termination timeout of 250ms"
        );
    }

    #[test]
    fn signal_failure_carries_number_and_reason() {
        let err = Error::signal_failed(15, "EPERM: Operation not permitted");
        assert!(matches!(err, Error::SignalFailed { signal: 15, .. }));
        assert_eq!(
            err.to_string(),
            "failed to send signal 15: EPERM: Operation not permitted"
        );
    }
}
