//! Process lifecycle and output events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw event from a process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEvent {
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The process that produced the event
    pub pid: u32,
    /// The type of event
    pub event_type: ProcessEventType,
    /// Optional data associated with the event
    pub data: Option<String>,
}

impl ProcessEvent {
    /// Create a new process event
    pub fn new(pid: u32, event_type: ProcessEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            pid,
            event_type,
            data: None,
        }
    }

    /// Create a new process event with data
    pub fn new_with_data(pid: u32, event_type: ProcessEventType, data: String) -> Self {
        Self {
            timestamp: Utc::now(),
            pid,
            event_type,
            data: Some(data),
        }
    }
}

/// Types of raw process events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessEventType {
    /// Process has started
    Started,
    /// Log line from stdout
    Stdout,
    /// Log line from stderr
    Stderr,
    /// A captured stream reached end-of-file
    StreamClosed(LogSource),
    /// Process has exited
    Exited {
        /// Exit code if the process exited normally
        code: Option<i32>,
        /// Terminating signal (Unix only)
        signal: Option<i32>,
    },
}

/// Source of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogSource {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl LogSource {
    /// Bit used in a run result's pending-stream set
    pub(crate) fn pending_bit(self) -> u8 {
        match self {
            LogSource::Stdout => 0b01,
            LogSource::Stderr => 0b10,
        }
    }

    /// Event type for a line read from this source
    pub(crate) fn line_event(self) -> ProcessEventType {
        match self {
            LogSource::Stdout => ProcessEventType::Stdout,
            LogSource::Stderr => ProcessEventType::Stderr,
        }
    }
}
