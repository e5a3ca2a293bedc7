//! Shadow copies of the tool executable
//!
//! Running the tool from a copy leaves the installed file free to be
//! replaced by an update while servers are still running. Copies live in
//! `<shadow_dir>/<hash prefix>/<file name>`, so identical builds share one
//! copy and a new build never overwrites a copy that may be executing.

use crate::checksum::sha256_file_with_retry;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::updater::make_executable;
use std::path::{Path, PathBuf};
use tracing::debug;

const HASH_PREFIX_LEN: usize = 16;

/// Copy `executable` into `shadow_dir` unless an identical copy exists
pub async fn shadow_copy(executable: &Path, shadow_dir: &Path, retry: &RetryPolicy) -> Result<PathBuf> {
    let digest = sha256_file_with_retry(executable, retry).await?;
    let file_name = executable.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("'{}' has no file name", executable.display()),
        )
    })?;
    let copy_dir = shadow_dir.join(&digest[..HASH_PREFIX_LEN]);
    let copy_path = copy_dir.join(file_name);

    if async_fs::metadata(&copy_path).await.is_ok() {
        debug!("Reusing shadow copy {}", copy_path.display());
        return Ok(copy_path);
    }

    async_fs::create_dir_all(&copy_dir).await?;
    let temp = tempfile::Builder::new()
        .prefix(".shadow-")
        .tempfile_in(&copy_dir)?;
    async_fs::copy(executable, temp.path()).await?;
    make_executable(temp.path())?;
    temp.persist(&copy_path).map_err(|e| e.error)?;

    debug!("Created shadow copy {}", copy_path.display());
    Ok(copy_path)
}

/// Remove every shadow copy except the one at `keep`
///
/// Copies still in use (locked on some platforms) are skipped. Returns how
/// many copies were removed.
pub async fn prune_shadow_copies(shadow_dir: &Path, keep: Option<&Path>) -> usize {
    let keep_dir = keep.and_then(Path::parent);
    let Ok(entries) = std::fs::read_dir(shadow_dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if Some(path.as_path()) == keep_dir || !path.is_dir() {
            continue;
        }
        match async_fs::remove_dir_all(&path).await {
            Ok(()) => removed += 1,
            Err(e) => debug!("Keeping shadow copy {}: {}", path.display(), e),
        }
    }
    removed
}
