//! Tests for running local commands to completion

#![cfg(unix)]

mod common;

use command_executor::{Command, Error, Executor, ProcessEventType};
use std::time::Duration;

#[smol_potat::test]
async fn test_version_output_is_captured() {
    let dir = tempfile::tempdir().unwrap();
    let tool = common::mock_tool(dir.path(), "charon", r#"[ "$1" = "VERSION" ] && echo "1.2.3""#);

    let command = Command::builder(&tool)
        .arg("VERSION")
        .execution_timeout(Duration::from_secs(30))
        .build();
    let result = Executor::new("test-version").run(&command).await.unwrap();

    assert_eq!(result.exit_code(), Some(0));
    assert_eq!(result.stdout().unwrap().trim(), "1.2.3");
    assert_eq!(result.stderr().unwrap(), "");
    assert!(!result.has_pending_data());
}

#[smol_potat::test]
async fn test_exit_code_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let tool = common::mock_tool(dir.path(), "charon", "echo 'schema not found' >&2\nexit 3");

    let command = Command::builder(&tool).build();
    let result = Executor::new("test-exit").run(&command).await.unwrap();

    assert_eq!(result.exit_code(), Some(3));
    assert!(!result.exit_status().unwrap().success());
    assert_eq!(result.stderr().unwrap(), "schema not found\n");
}

#[smol_potat::test]
async fn test_env_and_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let tool = common::mock_tool(dir.path(), "charon", "echo \"$CHARON_API_KEY\"\npwd");

    let command = Command::builder(&tool)
        .env("CHARON_API_KEY", "secret-key")
        .current_dir(work.path())
        .build();
    let result = Executor::new("test-env").run(&command).await.unwrap();

    let stdout = result.stdout().unwrap();
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("secret-key"));
    let cwd = std::path::PathBuf::from(lines.next().unwrap());
    assert_eq!(
        cwd.canonicalize().unwrap(),
        work.path().canonicalize().unwrap()
    );
}

#[smol_potat::test]
async fn test_arguments_reach_the_process_unsplit() {
    let dir = tempfile::tempdir().unwrap();
    let tool = common::mock_tool(dir.path(), "charon", "for a in \"$@\"; do echo \"[$a]\"; done");

    let command = Command::builder(&tool)
        .arg("DATA")
        .arg("FIND")
        .args(["--dataBase", "/tmp/my game/data.json"])
        .arg("")
        .arg("say \"hi\"")
        .build();
    let result = Executor::new("test-args").run(&command).await.unwrap();

    assert_eq!(
        result.stdout().unwrap(),
        "[DATA]\n[FIND]\n[--dataBase]\n[/tmp/my game/data.json]\n[say \"hi\"]\n"
    );
}

#[smol_potat::test]
async fn test_uncaptured_streams_have_no_buffers() {
    let command = Command::builder("sh")
        .args(["-c", "echo out; echo err >&2"])
        .capture_stdout(false)
        .build();
    let result = Executor::new("test-partial").run(&command).await.unwrap();

    assert!(result.stdout().is_none());
    assert_eq!(result.stderr().unwrap(), "err\n");
}

#[smol_potat::test]
async fn test_command_not_found() {
    let command = Command::builder("this_command_does_not_exist_12345").build();
    let err = Executor::new("test-not-found").run(&command).await.unwrap_err();
    assert!(matches!(err, Error::CommandNotFound { .. }), "{err:?}");
}

#[smol_potat::test]
async fn test_events_are_delivered_in_order() {
    let (tx, rx) = async_channel::unbounded();
    let command = Command::builder("sh")
        .args(["-c", "echo one; echo two"])
        .capture_stderr(false)
        .event_sink(tx)
        .build();
    let result = Executor::new("test-events").run(&command).await.unwrap();
    drop(result);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let kinds: Vec<_> = events.iter().map(|e| e.event_type.clone()).collect();
    assert_eq!(kinds.first(), Some(&ProcessEventType::Started));
    let lines: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == ProcessEventType::Stdout)
        .filter_map(|e| e.data.clone())
        .collect();
    assert_eq!(lines, vec!["one", "two"]);
    assert!(matches!(
        kinds.last(),
        Some(ProcessEventType::Exited { code: Some(0), .. })
    ));
}
