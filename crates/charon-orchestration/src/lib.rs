//! # Charon orchestration
//!
//! Drives the external Charon game-data tool: typed subcommand wrappers,
//! installing and updating the tool from a release feed, shadow copies of
//! the executable, and multi-step routines that run one at a time through a
//! shared [`RoutineQueue`].
//!
//! ## Example
//!
//! ```no_run
//! use charon_orchestration::{CharonTool, DirectoryFeed, Progress, RoutineQueue, Routines, Updater};
//! use command_executor::CancelSignal;
//! use std::sync::Arc;
//!
//! # async fn example() -> charon_orchestration::Result<()> {
//! let tool = CharonTool::new("/opt/charon/Charon");
//! let updater = Updater::new(tool, Arc::new(DirectoryFeed::new("/mnt/charon-releases")));
//! let routines = Routines::new(Arc::new(RoutineQueue::new()), updater);
//!
//! let version = routines
//!     .update_tool(
//!         None,
//!         &Progress::new(|message, done| println!("{message} {:.0}%", done * 100.0)),
//!         &CancelSignal::never(),
//!     )
//!     .await?;
//! println!("tool {version} ready");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod checksum;
pub mod env;
pub mod error;
pub mod feed;
pub mod formats;
pub mod progress;
pub mod queue;
pub mod retry;
pub mod routines;
pub mod shadow;
pub mod tool;
pub mod updater;

pub use env::{ToolEnvironment, ToolLog};
pub use error::{Error, Result};
pub use feed::{DirectoryFeed, ReleaseBuild, ReleaseFeed, ReleaseManifest};
pub use formats::{DataFormat, ImportMode, ValidationOption};
pub use progress::{Progress, ProgressCallback};
pub use queue::RoutineQueue;
pub use retry::{RetryPolicy, retry_io};
pub use routines::{NoHooks, RoutineHooks, Routines};
pub use shadow::{prune_shadow_copies, shadow_copy};
pub use tool::{CharonTool, CodeGenerationOptions, VERSION_TIMEOUT};
pub use updater::Updater;
