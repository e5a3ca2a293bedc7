//! Installing tool builds from a mirror directory

#![cfg(unix)]

mod common;

use charon_orchestration::checksum::sha256_file;
use charon_orchestration::{
    CharonTool, DirectoryFeed, Error, Progress, ReleaseBuild, ReleaseManifest, Updater,
};
use command_executor::{CancelSignal, cancel_pair};
use semver::Version;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Mirror holding one build that reports `version`
async fn mirror(root: &Path, version: &str) -> ReleaseBuild {
    let file = format!("Charon-{}", version);
    let path = common::mock_tool(root, &file, &format!("echo {}", version));
    let build = ReleaseBuild {
        version: Version::parse(version).unwrap(),
        sha256: sha256_file(&path).await.unwrap(),
        size: std::fs::metadata(&path).unwrap().len(),
        file,
    };
    write_manifest(root, vec![build.clone()]);
    build
}

fn write_manifest(root: &Path, builds: Vec<ReleaseBuild>) {
    let manifest = ReleaseManifest { builds };
    std::fs::write(
        root.join("manifest.json"),
        serde_json::to_vec(&manifest).unwrap(),
    )
    .unwrap();
}

fn leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".charon-download-"))
        .collect()
}

#[smol_potat::test]
async fn test_install_latest() {
    let feed_dir = tempfile::tempdir().unwrap();
    let install_dir = tempfile::tempdir().unwrap();
    mirror(feed_dir.path(), "2.0.0").await;

    let updater = Updater::new(
        CharonTool::new(install_dir.path().join("Charon")),
        Arc::new(DirectoryFeed::new(feed_dir.path())),
    );
    assert_eq!(updater.current_version().await.unwrap(), None);
    assert!(updater.check_for_update().await.unwrap().is_some());

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    let progress = Progress::new(move |_, done| sink.lock().unwrap().push(done));

    let installed = updater
        .install(None, &progress, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(installed.version, Version::new(2, 0, 0));
    assert_eq!(
        updater.current_version().await.unwrap(),
        Some(Version::new(2, 0, 0))
    );
    assert!(updater.check_for_update().await.unwrap().is_none());
    assert!(leftovers(install_dir.path()).is_empty());

    let reports = reports.lock().unwrap();
    assert_eq!(reports.last(), Some(&1.0));
    assert!(reports.windows(2).all(|pair| pair[0] <= pair[1]), "{reports:?}");
}

#[smol_potat::test]
async fn test_checksum_mismatch_keeps_installed_tool() {
    let feed_dir = tempfile::tempdir().unwrap();
    let install_dir = tempfile::tempdir().unwrap();
    let mut build = mirror(feed_dir.path(), "2.0.0").await;
    build.sha256 = "00".repeat(32);
    write_manifest(feed_dir.path(), vec![build]);

    let executable = common::mock_tool(install_dir.path(), "Charon", "echo 1.0.0");
    let updater = Updater::new(
        CharonTool::new(&executable),
        Arc::new(DirectoryFeed::new(feed_dir.path())),
    );

    let err = updater
        .install(None, &Progress::none(), &CancelSignal::never())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }), "{err:?}");
    assert_eq!(
        updater.current_version().await.unwrap(),
        Some(Version::new(1, 0, 0))
    );
    assert!(leftovers(install_dir.path()).is_empty());
}

#[smol_potat::test]
async fn test_requested_version_and_fallback() {
    let feed_dir = tempfile::tempdir().unwrap();
    let install_dir = tempfile::tempdir().unwrap();
    let old = mirror(feed_dir.path(), "1.5.0").await;
    let new = mirror(feed_dir.path(), "2.0.0").await;
    write_manifest(feed_dir.path(), vec![new, old]);

    let updater = Updater::new(
        CharonTool::new(install_dir.path().join("Charon")),
        Arc::new(DirectoryFeed::new(feed_dir.path())),
    );
    let pinned = Version::new(1, 5, 0);
    let installed = updater
        .install(Some(&pinned), &Progress::none(), &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(installed.version, pinned);

    let missing = Version::new(3, 0, 0);
    let installed = updater
        .install(Some(&missing), &Progress::none(), &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(installed.version, Version::new(2, 0, 0));
}

#[smol_potat::test]
async fn test_cancelled_install() {
    let feed_dir = tempfile::tempdir().unwrap();
    let install_dir = tempfile::tempdir().unwrap();
    mirror(feed_dir.path(), "2.0.0").await;

    let updater = Updater::new(
        CharonTool::new(install_dir.path().join("Charon")),
        Arc::new(DirectoryFeed::new(feed_dir.path())),
    );
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let err = updater
        .install(None, &Progress::none(), &signal)
        .await
        .unwrap_err();
    assert!(err.is_cancelled(), "{err:?}");
    assert!(!install_dir.path().join("Charon").exists());
    assert!(leftovers(install_dir.path()).is_empty());
}

#[smol_potat::test]
async fn test_empty_feed() {
    let feed_dir = tempfile::tempdir().unwrap();
    let install_dir = tempfile::tempdir().unwrap();
    write_manifest(feed_dir.path(), Vec::new());

    let updater = Updater::new(
        CharonTool::new(install_dir.path().join("Charon")),
        Arc::new(DirectoryFeed::new(feed_dir.path())),
    );
    assert!(matches!(
        updater.check_for_update().await,
        Err(Error::NoBuildAvailable)
    ));
}
