//! Routines with host hooks

#![cfg(unix)]

mod common;

use async_trait::async_trait;
use charon_orchestration::{
    CharonTool, CodeGenerationOptions, DataFormat, DirectoryFeed, ImportMode, Progress, ReleaseManifest,
    ReleaseBuild, RoutineHooks, RoutineQueue, Routines, Updater, ValidationOption,
};
use charon_orchestration::checksum::sha256_file;
use command_executor::{CancelSignal, cancel_pair};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingHooks {
    reimported: Mutex<Vec<PathBuf>>,
    generated: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl RoutineHooks for RecordingHooks {
    async fn reimport(&self, data_base: &Path) -> charon_orchestration::Result<()> {
        self.reimported.lock().unwrap().push(data_base.to_path_buf());
        Ok(())
    }

    async fn on_code_generated(&self, output_directory: &Path) -> charon_orchestration::Result<()> {
        self.generated
            .lock()
            .unwrap()
            .push(output_directory.to_path_buf());
        Ok(())
    }
}

fn routines(dir: &Path, hooks: Arc<RecordingHooks>) -> Routines {
    let feed_dir = dir.join("feed");
    std::fs::create_dir_all(&feed_dir).unwrap();
    std::fs::write(
        feed_dir.join("manifest.json"),
        serde_json::to_vec(&ReleaseManifest::default()).unwrap(),
    )
    .unwrap();

    let tool = CharonTool::new(common::mock_tool(dir, "Charon", common::MOCK_TOOL));
    let updater = Updater::new(tool, Arc::new(DirectoryFeed::new(feed_dir)));
    Routines::new(Arc::new(RoutineQueue::new()), updater).with_hooks(hooks)
}

#[smol_potat::test]
async fn test_generate_code_notifies_host() {
    let dir = tempfile::tempdir().unwrap();
    let hooks = Arc::new(RecordingHooks::default());
    let routines = routines(dir.path(), hooks.clone());
    let output = dir.path().join("Generated");

    let options = CodeGenerationOptions {
        output_directory: output.clone(),
        namespace: Some("Game.Data".into()),
        ..Default::default()
    };
    routines
        .generate_code(
            &dir.path().join("gamedata.json"),
            &options,
            &Progress::none(),
            &CancelSignal::never(),
        )
        .await
        .unwrap();

    assert_eq!(*hooks.generated.lock().unwrap(), [output]);
    let call = &common::calls(dir.path())[0];
    assert!(call.starts_with("GENERATE CSHARPCODE --dataBase "), "{call}");
    assert!(call.contains("--namespace Game.Data"), "{call}");
    assert!(!routines.queue().is_running());
}

#[smol_potat::test]
async fn test_repairing_validation_reimports() {
    let dir = tempfile::tempdir().unwrap();
    let hooks = Arc::new(RecordingHooks::default());
    let routines = routines(dir.path(), hooks.clone());
    let data_base = dir.path().join("gamedata.json");

    let report = routines
        .validate(
            &data_base,
            &[ValidationOption::CheckTranslation],
            &Progress::none(),
            &CancelSignal::never(),
        )
        .await
        .unwrap();
    assert_eq!(report, serde_json::json!({"records": []}));
    assert!(hooks.reimported.lock().unwrap().is_empty());

    routines
        .validate(
            &data_base,
            &[ValidationOption::Repair],
            &Progress::none(),
            &CancelSignal::never(),
        )
        .await
        .unwrap();
    assert_eq!(*hooks.reimported.lock().unwrap(), [data_base]);
}

#[smol_potat::test]
async fn test_backup_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let routines = routines(dir.path(), Arc::new(RecordingHooks::default()));
    let output = dir.path().join("backup.msgpack");

    routines
        .backup(
            &dir.path().join("gamedata.json"),
            &output,
            DataFormat::MessagePack,
            &Progress::none(),
            &CancelSignal::never(),
        )
        .await
        .unwrap();
    assert!(output.exists());
    assert!(common::calls(dir.path())[0].ends_with("--outputFormat msgpack"));
}

#[smol_potat::test]
async fn test_cancelled_routine_never_runs_tool() {
    let dir = tempfile::tempdir().unwrap();
    let hooks = Arc::new(RecordingHooks::default());
    let routines = routines(dir.path(), hooks.clone());
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let err = routines
        .import(
            &dir.path().join("gamedata.json"),
            &dir.path().join("input.json"),
            DataFormat::Json,
            ImportMode::CreateAndUpdate,
            &Progress::none(),
            &signal,
        )
        .await
        .unwrap_err();
    assert!(err.is_cancelled(), "{err:?}");
    assert!(common::calls(dir.path()).is_empty());
    assert!(hooks.reimported.lock().unwrap().is_empty());
}

#[smol_potat::test]
async fn test_update_skips_installed_version() {
    let dir = tempfile::tempdir().unwrap();
    let routines = routines(dir.path(), Arc::new(RecordingHooks::default()));

    // The feed is empty, so any install attempt would fail
    let version = routines
        .update_tool(
            Some(&semver::Version::new(1, 2, 3)),
            &Progress::none(),
            &CancelSignal::never(),
        )
        .await
        .unwrap();
    assert_eq!(version, semver::Version::new(1, 2, 3));
}

#[smol_potat::test]
async fn test_update_without_version_keeps_latest_install() {
    let dir = tempfile::tempdir().unwrap();
    let routines = routines(dir.path(), Arc::new(RecordingHooks::default()));
    let installed = std::fs::read(dir.path().join("Charon")).unwrap();

    // The feed's only build is the installed version
    let feed_dir = dir.path().join("feed");
    let build_path = common::mock_tool(&feed_dir, "Charon-1.2.3", "echo 1.2.3");
    let manifest = ReleaseManifest {
        builds: vec![ReleaseBuild {
            version: semver::Version::new(1, 2, 3),
            file: "Charon-1.2.3".to_string(),
            sha256: sha256_file(&build_path).await.unwrap(),
            size: 0,
        }],
    };
    std::fs::write(
        feed_dir.join("manifest.json"),
        serde_json::to_vec(&manifest).unwrap(),
    )
    .unwrap();

    let version = routines
        .update_tool(None, &Progress::none(), &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(version, semver::Version::new(1, 2, 3));
    assert_eq!(std::fs::read(dir.path().join("Charon")).unwrap(), installed);
    assert!(common::calls(dir.path()).iter().all(|call| call == "VERSION"));
}
