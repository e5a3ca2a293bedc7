//! Error types for the process registry

use std::path::PathBuf;
use thiserror::Error;

/// Process registry error type
#[derive(Error, Debug)]
pub enum Error {
    /// Lock file content could not be parsed
    #[error("Invalid lock file: {0}")]
    InvalidLockFile(String),

    /// Target path could not be made absolute
    #[error("Invalid target path '{}': {reason}", path.display())]
    InvalidTarget {
        /// The offending path
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// Process survived both the close request and the kill
    #[error("Process {pid} is still running after being killed")]
    StillRunning {
        /// Process ID
        pid: u32,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command execution error
    #[error("Command execution error: {0}")]
    CommandExecution(#[from] command_executor::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
