//! Installing and updating the tool from a release feed

use crate::checksum::{digests_match, sha256_file_with_retry};
use crate::error::{Error, Result};
use crate::feed::{ReleaseBuild, ReleaseFeed};
use crate::progress::Progress;
use crate::retry::RetryPolicy;
use crate::tool::CharonTool;
use command_executor::{CancelSignal, Error as ExecutorError};
use semver::Version;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Installs tool builds over the executable of a [`CharonTool`]
pub struct Updater {
    tool: CharonTool,
    feed: Arc<dyn ReleaseFeed>,
    retry: RetryPolicy,
}

impl Updater {
    /// Updater installing builds from `feed` at the tool's executable path
    pub fn new(tool: CharonTool, feed: Arc<dyn ReleaseFeed>) -> Self {
        Self {
            tool,
            feed,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy for hashing downloaded files
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The managed tool
    pub fn tool(&self) -> &CharonTool {
        &self.tool
    }

    /// Executable present and runtime available
    pub fn check_requirements(&self) -> Result<()> {
        self.tool.check_requirements()
    }

    /// Installed version, `None` when nothing is installed
    pub async fn current_version(&self) -> Result<Option<Version>> {
        match self.tool.version().await {
            Ok(version) => Ok(Some(version)),
            Err(Error::CommandExecution(ExecutorError::ExecutableNotFound { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Newest build if it is newer than the installed one
    pub async fn check_for_update(&self) -> Result<Option<ReleaseBuild>> {
        let manifest = self.feed.manifest().await?;
        let latest = manifest.latest().ok_or(Error::NoBuildAvailable)?;
        let current = self.current_version().await?;
        match current {
            Some(current) if current >= latest.version => {
                debug!("Installed version {} is up to date", current);
                Ok(None)
            }
            _ => Ok(Some(latest.clone())),
        }
    }

    /// Download, verify and install `requested` (or the latest build)
    ///
    /// The installed executable is only replaced after the download matched
    /// the manifest's hash. The download's temp file is removed on every
    /// path out of this function.
    pub async fn install(
        &self,
        requested: Option<&Version>,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<ReleaseBuild> {
        progress.report("Fetching release manifest", 0.0);
        let manifest = self.feed.manifest().await?;
        let build = manifest
            .select(requested)
            .cloned()
            .ok_or(Error::NoBuildAvailable)?;
        if let Some(requested) = requested.filter(|requested| **requested != build.version) {
            warn!(
                "Version {} is not available, installing {} instead",
                requested, build.version
            );
        }
        check_cancelled(cancel)?;

        let executable = self.tool.executable();
        let install_dir = executable
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        async_fs::create_dir_all(install_dir).await?;

        // Same directory as the executable so the final rename stays on one filesystem
        let download = tempfile::Builder::new()
            .prefix(".charon-download-")
            .tempfile_in(install_dir)?;
        self.feed
            .download(&build, download.path(), &progress.sub_range(0.05, 0.85), cancel)
            .await?;
        check_cancelled(cancel)?;

        progress.report("Verifying download", 0.9);
        let actual = sha256_file_with_retry(download.path(), &self.retry).await?;
        if !digests_match(&build.sha256, &actual) {
            return Err(Error::ChecksumMismatch {
                path: download.path().to_path_buf(),
                expected: build.sha256.clone(),
                actual,
            });
        }
        check_cancelled(cancel)?;

        progress.report("Installing", 0.95);
        make_executable(download.path())?;
        download.persist(executable).map_err(|e| e.error)?;

        info!("Installed tool {} at {}", build.version, executable.display());
        progress.report(&format!("Installed {}", build.version), 1.0);
        Ok(build)
    }
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("tool", &self.tool)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

pub(crate) fn check_cancelled(cancel: &CancelSignal) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

pub(crate) fn make_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
