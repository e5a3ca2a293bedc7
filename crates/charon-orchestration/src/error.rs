//! Error types for tool orchestration

use std::path::PathBuf;
use thiserror::Error;

/// Orchestration error type
#[derive(Error, Debug)]
pub enum Error {
    /// A runtime the tool needs is not on `PATH`
    #[error("Runtime '{runtime}' is required to run the tool but was not found on PATH")]
    RuntimeMissing {
        /// Runtime executable name
        runtime: String,
    },

    /// The tool ran and reported failure
    #[error("{operation} failed: {message}")]
    ToolFailed {
        /// Tool subcommand
        operation: String,
        /// Exit code, `None` when ended by a signal
        code: Option<i32>,
        /// Captured stderr, or a generic description when stderr was empty
        message: String,
    },

    /// `VERSION` output was not a semantic version
    #[error("Tool reported an invalid version '{output}': {source}")]
    InvalidVersion {
        /// Trimmed stdout
        output: String,
        /// Parse failure
        source: semver::Error,
    },

    /// Release manifest is unusable
    #[error("Invalid release manifest: {0}")]
    InvalidManifest(String),

    /// Manifest has no build to install
    #[error("No tool build available in the release feed")]
    NoBuildAvailable,

    /// Downloaded file does not match the manifest
    #[error("Checksum mismatch for '{}': expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        /// Verified file
        path: PathBuf,
        /// Hash from the manifest
        expected: String,
        /// Hash of the file
        actual: String,
    },

    /// Operation cancelled by the caller
    #[error("Operation was cancelled")]
    Cancelled,

    /// Command execution error
    #[error("Command execution error: {0}")]
    CommandExecution(#[from] command_executor::Error),

    /// Server registry error
    #[error("Server registry error: {0}")]
    Registry(#[from] process_registry::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a tool failure from the exit code and captured stderr
    pub fn tool_failed(operation: impl Into<String>, code: Option<i32>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        let message = if !stderr.is_empty() {
            stderr.to_string()
        } else {
            match code {
                Some(code) => format!("exited with code {}", code),
                None => "was terminated by a signal".to_string(),
            }
        };
        Self::ToolFailed {
            operation: operation.into(),
            code,
            message,
        }
    }

    /// True for cancellation at any layer
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::Cancelled | Error::CommandExecution(command_executor::Error::Cancelled)
        )
    }

    /// True for a missing executable or runtime
    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            Error::RuntimeMissing { .. }
                | Error::CommandExecution(
                    command_executor::Error::ExecutableNotFound { .. }
                        | command_executor::Error::NotExecutable { .. }
                        | command_executor::Error::CommandNotFound { .. }
                )
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failed_prefers_stderr() {
        let err = Error::tool_failed("DATA IMPORT", Some(1), "  Schema 'Hero' not found\n");
        assert_eq!(err.to_string(), "DATA IMPORT failed: Schema 'Hero' not found");
    }

    #[test]
    fn test_tool_failed_without_stderr() {
        let err = Error::tool_failed("DATA EXPORT", Some(2), "");
        assert_eq!(err.to_string(), "DATA EXPORT failed: exited with code 2");
    }

    #[test]
    fn test_cancellation_from_executor() {
        let err: Error = command_executor::Error::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(!Error::NoBuildAvailable.is_cancelled());
    }
}
