//! Lock files recording where a tool server for a target is listening
//!
//! A lock file holds two lines: the server's decimal PID and its absolute
//! listen URI. Its name is the SHA-256 of the normalized target path, so
//! every session derives the same file for the same game data.

use crate::error::{Error, Result};
use command_executor::signal;
use sha2::{Digest, Sha256};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use url::Url;

/// Extension of lock files inside the lock directory
pub const LOCK_FILE_EXTENSION: &str = "lock";

/// Parsed lock file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockFileContent {
    /// Server process ID
    pub pid: u32,
    /// Address the server listens on
    pub address: Url,
}

impl LockFileContent {
    /// Create lock file content
    pub fn new(pid: u32, address: Url) -> Self {
        Self { pid, address }
    }

    /// Parse the two-line lock file format
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim);
        let pid_line = lines
            .next()
            .ok_or_else(|| Error::InvalidLockFile("missing process id".into()))?;
        let address_line = lines
            .next()
            .ok_or_else(|| Error::InvalidLockFile("missing listen address".into()))?;

        let pid = pid_line
            .parse::<u32>()
            .ok()
            .filter(|pid| *pid != 0)
            .ok_or_else(|| Error::InvalidLockFile(format!("bad process id '{}'", pid_line)))?;
        let address = Url::parse(address_line)
            .map_err(|e| Error::InvalidLockFile(format!("bad listen address '{}': {}", address_line, e)))?;
        if !address.has_host() {
            return Err(Error::InvalidLockFile(format!(
                "listen address '{}' has no host",
                address_line
            )));
        }

        Ok(Self { pid, address })
    }

    /// Render in the on-disk format
    pub fn render(&self) -> String {
        format!("{}\n{}\n", self.pid, format_address(&self.address))
    }
}

/// `http://host:port` without the trailing slash `Url` adds to an empty path
pub fn format_address(address: &Url) -> &str {
    let text = address.as_str();
    if address.path() == "/" && address.query().is_none() && address.fragment().is_none() {
        text.trim_end_matches('/')
    } else {
        text
    }
}

/// What a lock file on disk says about its server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockFileState {
    /// No lock file
    Missing,
    /// Parsed, and the process is running
    Valid(LockFileContent),
    /// Unparsable, or its process is gone
    Orphaned,
}

/// Absolute, separator-unified form of `target` used for hashing
///
/// On Windows the result is lowercased since paths are case-insensitive there.
pub fn normalize_target_path(target: &Path) -> Result<String> {
    let absolute = std::path::absolute(target).map_err(|e| Error::InvalidTarget {
        path: target.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut normalized = absolute.to_string_lossy().replace('\\', "/");
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    if cfg!(windows) {
        normalized = normalized.to_lowercase();
    }
    Ok(normalized)
}

/// Lock file location for `target` inside `lock_dir`
pub fn lock_file_path(lock_dir: &Path, target: &Path) -> Result<PathBuf> {
    let normalized = normalize_target_path(target)?;
    let digest = Sha256::digest(normalized.as_bytes());
    Ok(lock_dir.join(format!("{}.{}", hex::encode(digest), LOCK_FILE_EXTENSION)))
}

/// Write `content` to `path` through a sibling temp file and a rename
///
/// Readers see either the previous file or the complete new one.
pub fn write_lock_file(path: &Path, content: &LockFileContent) -> Result<()> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".charon-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(content.render().as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    debug!("Wrote lock file {} (pid {})", path.display(), content.pid);
    Ok(())
}

/// Read and parse a lock file without checking the process
///
/// `Ok(None)` when the file does not exist.
pub async fn read_lock_file(path: &Path) -> Result<Option<LockFileContent>> {
    match async_fs::read_to_string(path).await {
        Ok(text) => LockFileContent::parse(&text).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Classify the lock file at `path`
pub async fn inspect_lock_file(path: &Path) -> LockFileState {
    match read_lock_file(path).await {
        Ok(None) => LockFileState::Missing,
        Ok(Some(content)) if signal::is_alive(content.pid) => LockFileState::Valid(content),
        Ok(Some(content)) => {
            trace!("Lock file {} names dead pid {}", path.display(), content.pid);
            LockFileState::Orphaned
        }
        Err(e) => {
            trace!("Lock file {} is unusable: {}", path.display(), e);
            LockFileState::Orphaned
        }
    }
}

/// Content of a valid lock file; orphaned files are deleted
///
/// Never fails: every problem is reported as `None`.
pub async fn try_read_lock_file(path: &Path) -> Option<LockFileContent> {
    match inspect_lock_file(path).await {
        LockFileState::Valid(content) => Some(content),
        LockFileState::Missing => None,
        LockFileState::Orphaned => {
            delete_lock_file(path).await;
            None
        }
    }
}

/// Best-effort removal; returns whether a file was deleted
pub async fn delete_lock_file(path: &Path) -> bool {
    match async_fs::remove_file(path).await {
        Ok(()) => {
            debug!("Deleted lock file {}", path.display());
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            debug!("Failed to delete lock file {}: {}", path.display(), e);
            false
        }
    }
}
