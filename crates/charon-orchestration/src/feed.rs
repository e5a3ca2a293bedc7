//! Release feeds listing installable tool builds

use crate::error::{Error, Result};
use crate::progress::Progress;
use async_trait::async_trait;
use command_executor::CancelSignal;
use futures_lite::{AsyncReadExt, AsyncWriteExt};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// File name of the manifest inside a feed
pub const MANIFEST_FILE: &str = "manifest.json";

const COPY_CHUNK_SIZE: usize = 256 * 1024;

/// One installable build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseBuild {
    /// Tool version of the build
    pub version: Version,
    /// File name within the feed
    pub file: String,
    /// Lowercase hex SHA-256 of the file
    pub sha256: String,
    /// File size in bytes, zero when unknown
    #[serde(default)]
    pub size: u64,
}

/// Builds offered by a feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    /// Available builds, in any order
    pub builds: Vec<ReleaseBuild>,
}

impl ReleaseManifest {
    /// Highest version in the manifest
    pub fn latest(&self) -> Option<&ReleaseBuild> {
        self.builds.iter().max_by(|a, b| a.version.cmp(&b.version))
    }

    /// Build with exactly `version`
    pub fn find(&self, version: &Version) -> Option<&ReleaseBuild> {
        self.builds.iter().find(|build| &build.version == version)
    }

    /// `requested` if present, the latest build otherwise
    pub fn select(&self, requested: Option<&Version>) -> Option<&ReleaseBuild> {
        match requested {
            Some(version) => self.find(version).or_else(|| {
                debug!("Version {} not in manifest, using latest", version);
                self.latest()
            }),
            None => self.latest(),
        }
    }
}

/// Source of tool builds
#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    /// Fetch the current manifest
    async fn manifest(&self) -> Result<ReleaseManifest>;

    /// Write `build` to `destination`, returning the number of bytes written
    async fn download(
        &self,
        build: &ReleaseBuild,
        destination: &Path,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<u64>;
}

/// Feed backed by a local or mounted mirror directory
///
/// The directory holds `manifest.json` and the build files it names.
#[derive(Debug, Clone)]
pub struct DirectoryFeed {
    root: PathBuf,
}

impl DirectoryFeed {
    /// Feed rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mirror directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn build_path(&self, build: &ReleaseBuild) -> Result<PathBuf> {
        let file = Path::new(&build.file);
        let mut components = file.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(file)),
            _ => Err(Error::InvalidManifest(format!(
                "build file '{}' must be a plain file name",
                build.file
            ))),
        }
    }
}

#[async_trait]
impl ReleaseFeed for DirectoryFeed {
    async fn manifest(&self) -> Result<ReleaseManifest> {
        let path = self.root.join(MANIFEST_FILE);
        let text = async_fs::read_to_string(&path).await?;
        let manifest: ReleaseManifest = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidManifest(format!("{}: {}", path.display(), e)))?;
        debug!("Feed {} lists {} builds", self.root.display(), manifest.builds.len());
        Ok(manifest)
    }

    async fn download(
        &self,
        build: &ReleaseBuild,
        destination: &Path,
        progress: &Progress,
        cancel: &CancelSignal,
    ) -> Result<u64> {
        let source_path = self.build_path(build)?;
        let mut source = async_fs::File::open(&source_path).await?;
        let total = match build.size {
            0 => source.metadata().await?.len(),
            size => size,
        };
        let mut target = async_fs::File::create(destination).await?;

        let message = format!("Downloading {} {}", build.file, build.version);
        progress.report(&message, 0.0);
        let mut buf = vec![0u8; COPY_CHUNK_SIZE];
        let mut copied = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let read = source.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            target.write_all(&buf[..read]).await?;
            copied += read as u64;
            if total > 0 {
                progress.report(&message, copied as f32 / total as f32);
            }
        }
        target.flush().await?;
        target.sync_all().await?;
        progress.report(&message, 1.0);
        Ok(copied)
    }
}
