//! Discovery and teardown of long-lived tool servers
//!
//! A server started for a game data file is announced in a lock file named
//! after the file's path, so that a later session (or a different editor) can
//! find it again, reconnect to its listen address, or end it. Servers
//! started by this session are also kept in a [`ProcessList`] whose
//! background reconciler notices when they exit.

#![warn(missing_docs)]

pub mod error;
pub mod lock;
pub mod process_list;
pub mod server;

pub use error::{Error, Result};
pub use lock::{
    LockFileContent, LockFileState, delete_lock_file, format_address, inspect_lock_file,
    lock_file_path, try_read_lock_file, write_lock_file,
};
pub use process_list::{DEFAULT_RECONCILE_INTERVAL, DEFAULT_RETENTION, ProcessList, ServerInfo};
pub use server::{DEFAULT_GRACE_PERIOD, ServerProcess, find_and_end_gracefully};
