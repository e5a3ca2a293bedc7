//! Shared helpers for the CLI tests

#![allow(dead_code)]

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Mock tool answering the subcommands the tests use
pub const MOCK_TOOL: &str = r#"
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
    VERSION) echo "1.2.3"; exit 0 ;;
    START) exec sleep 30 >/dev/null 2>&1 ;;
    Ghost) echo "Document 'Ghost' not found" >&2; exit 3 ;;
  esac
  shift
done
if [ -n "$out" ]; then
  printf '{"Id":"Sword"}' > "$out"
fi
"#;

/// Temp directory holding a config file and a mock tool
pub struct CliTestContext {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl CliTestContext {
    /// Context whose tool is `MOCK_TOOL`
    pub fn new() -> Result<Self> {
        let ctx = Self::without_tool()?;
        write_script(&ctx.dir.path().join("Charon"), MOCK_TOOL)?;
        Ok(ctx)
    }

    /// Context whose tool executable does not exist yet
    pub fn without_tool() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().display();
        let config = format!(
            r#"version: "1.0"
tool:
  executable: {root}/Charon
paths:
  lock_dir: {root}/locks
  shadow_dir: {root}/shadow
servers:
  grace_period: 2
updates:
  feed_dir: {root}/feed
"#
        );
        let config_path = dir.path().join("charon.yaml");
        std::fs::write(&config_path, config)?;
        Ok(Self { dir, config_path })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Run the host binary with this context's configuration
    pub fn run_cli_command(&self, args: &[&str]) -> Result<CliOutput> {
        let output = Command::new(env!("CARGO_BIN_EXE_charon-host"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .output()?;

        Ok(CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            exit_code: output.status.code(),
        })
    }
}

/// Write an executable `sh` script
pub fn write_script(path: &Path, body: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, format!("#!/bin/sh\n{}\n", body))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[derive(Debug)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: Option<i32>,
}

impl CliOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.success {
            panic!(
                "Command failed with exit code {:?}\nSTDOUT:\n{}\nSTDERR:\n{}",
                self.exit_code, self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        if self.success {
            panic!(
                "Command succeeded but was expected to fail\nSTDOUT:\n{}\nSTDERR:\n{}",
                self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_contains(&self, text: &str) -> &Self {
        if !self.stdout.contains(text) && !self.stderr.contains(text) {
            panic!(
                "Output does not contain '{}'\nSTDOUT:\n{}\nSTDERR:\n{}",
                text, self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        if !self.stdout.contains(text) {
            panic!("STDOUT does not contain '{}'\nSTDOUT:\n{}", text, self.stdout);
        }
        self
    }
}
