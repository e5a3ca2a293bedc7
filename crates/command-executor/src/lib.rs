//! Runtime-agnostic child process execution
//!
//! This crate launches external tools, captures their stdout/stderr without
//! blocking on full pipes, and bounds both the wait for exit and the wait for
//! output to drain. Processes can be cancelled cooperatively, and processes
//! started by someone else can be signalled by PID.
//!
//! ```no_run
//! use command_executor::{Command, Executor};
//! use std::time::Duration;
//!
//! # async fn example() -> command_executor::Result<()> {
//! let command = Command::builder("/opt/charon/Charon")
//!     .arg("VERSION")
//!     .execution_timeout(Duration::from_secs(30))
//!     .build();
//! let result = Executor::new("charon").run(&command).await?;
//! println!("{}", result.stdout().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod args;
pub mod cancel;
pub mod command;
pub mod error;
pub mod event;
pub mod executor;
pub mod process;
pub mod run_result;
pub mod signal;

pub use args::Argument;
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use command::{Command, CommandBuilder};
pub use error::{Error, Result, TimeoutPhase};
pub use event::{LogSource, ProcessEvent, ProcessEventType};
pub use executor::Executor;
pub use process::{ExitStatus, ProcessHandle};
pub use run_result::RunResult;
