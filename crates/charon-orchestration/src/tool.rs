//! Typed wrapper around the tool's command-line contract
//!
//! Every subcommand is an uppercase verb followed by flag/value pairs. Data
//! operations exchange documents through temporary JSON files passed as
//! `--input` and `--output`; the temp files are removed when the call
//! returns, whether it succeeded or not.

use crate::env::ToolEnvironment;
use crate::error::{Error, Result};
use crate::formats::{DataFormat, ImportMode, ValidationOption};
use command_executor::{
    Argument, CancelSignal, Command, CommandBuilder, Executor, ProcessEvent, ProcessEventType,
    RunResult, args,
};
use process_registry::{ServerProcess, format_address};
use semver::Version;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use url::Url;

/// Bound on `VERSION`
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for `GENERATE CSHARPCODE`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeGenerationOptions {
    /// Directory receiving the generated sources
    pub output_directory: PathBuf,
    /// Namespace of the generated classes
    pub namespace: Option<String>,
    /// Name of the root game data class
    pub game_data_class_name: Option<String>,
    /// Name of the document base class
    pub document_class_name: Option<String>,
    /// Remove stale files from the output directory first
    pub clear_output_directory: bool,
}

/// Invokes the tool executable
#[derive(Debug, Clone)]
pub struct CharonTool {
    executable: PathBuf,
    runtime: Option<String>,
    environment: ToolEnvironment,
    executor: Executor,
    execution_timeout: Duration,
    termination_timeout: Option<Duration>,
    cancel: Option<CancelSignal>,
    log_output: bool,
}

impl CharonTool {
    /// Tool at `executable`, run directly
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            runtime: None,
            environment: ToolEnvironment::default(),
            executor: Executor::new("charon"),
            execution_timeout: Duration::ZERO,
            termination_timeout: None,
            cancel: None,
            log_output: false,
        }
    }

    /// Run the executable through `runtime` (for example `dotnet`)
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    /// Variables set on every invocation
    pub fn with_environment(mut self, environment: ToolEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Bound for data operations; zero means unbounded
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Bound for draining output after exit; zero means unbounded
    pub fn with_termination_timeout(mut self, timeout: Duration) -> Self {
        self.termination_timeout = Some(timeout);
        self
    }

    /// Forward the tool's output lines to `tracing`
    pub fn with_output_logging(mut self, enabled: bool) -> Self {
        self.log_output = enabled;
        self
    }

    /// Same tool, with process waits abandoned when `signal` fires
    pub fn with_cancel_signal(&self, signal: CancelSignal) -> Self {
        Self {
            cancel: Some(signal),
            ..self.clone()
        }
    }

    /// Same configuration, different executable (a shadow copy for instance)
    pub fn with_executable(&self, executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            ..self.clone()
        }
    }

    /// Path of the tool executable
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Runtime the executable is launched through
    pub fn runtime(&self) -> Option<&str> {
        self.runtime.as_deref()
    }

    /// Variables set on every invocation
    pub fn environment(&self) -> &ToolEnvironment {
        &self.environment
    }

    /// Check that the executable and its runtime are present
    pub fn check_requirements(&self) -> Result<()> {
        Executor::ensure_executable(&self.executable)?;
        if let Some(runtime) = &self.runtime {
            let resolved = which::which(runtime).map_err(|e| {
                debug!("Runtime '{}' not found: {}", runtime, e);
                Error::RuntimeMissing {
                    runtime: runtime.clone(),
                }
            })?;
            debug!("Using runtime {}", resolved.display());
        }
        Ok(())
    }

    /// Command for `args` with the tool's program, environment and cancellation applied
    pub fn command(&self, args: impl Into<Argument>) -> CommandBuilder {
        let builder = match &self.runtime {
            Some(runtime) => Command::builder(runtime).arg(&self.executable),
            None => Command::builder(&self.executable),
        };
        let mut builder = builder.arg(args).envs(self.environment.vars());
        if let Some(timeout) = self.termination_timeout {
            builder = builder.termination_timeout(timeout);
        }
        if let Some(signal) = &self.cancel {
            builder = builder.cancel_signal(signal.clone());
        }
        if self.log_output {
            let (sender, receiver) = async_channel::unbounded();
            smol::spawn(forward_output(receiver)).detach();
            builder = builder.event_sink(sender);
        }
        builder
    }

    /// `VERSION`: the tool's own version
    pub async fn version(&self) -> Result<Version> {
        let result = self.invoke("VERSION", args!["VERSION"], VERSION_TIMEOUT).await?;
        parse_version(&result.stdout().unwrap_or_default())
    }

    /// `INIT`: create an empty game data file
    pub async fn init(&self, data_base: &Path) -> Result<()> {
        self.invoke("INIT", args!["INIT", data_base], self.execution_timeout)
            .await
            .map(drop)
    }

    /// `DATA CREATE`: add a document, returning it as stored
    pub async fn create_document(&self, data_base: &Path, schema: &str, document: &Value) -> Result<Value> {
        self.invoke_json(
            "DATA CREATE",
            args!["DATA", "CREATE", "--dataBase", data_base, "--schema", schema],
            Some(document),
        )
        .await
    }

    /// `DATA UPDATE`: update a document, returning it as stored
    pub async fn update_document(&self, data_base: &Path, schema: &str, document: &Value) -> Result<Value> {
        self.invoke_json(
            "DATA UPDATE",
            args!["DATA", "UPDATE", "--dataBase", data_base, "--schema", schema],
            Some(document),
        )
        .await
    }

    /// `DATA DELETE`: remove a document, returning what was deleted
    pub async fn delete_document(&self, data_base: &Path, schema: &str, id: &str) -> Result<Value> {
        self.invoke_json(
            "DATA DELETE",
            args!["DATA", "DELETE", "--dataBase", data_base, "--schema", schema, "--id", id],
            None,
        )
        .await
    }

    /// `DATA FIND`: one document by id, `None` when absent
    pub async fn find_document(&self, data_base: &Path, schema: &str, id: &str) -> Result<Option<Value>> {
        let found = self
            .invoke_json(
                "DATA FIND",
                args!["DATA", "FIND", "--dataBase", data_base, "--schema", schema, "--id", id],
                None,
            )
            .await?;
        Ok(Some(found).filter(|value| !value.is_null()))
    }

    /// `DATA LIST`: every document of `schema`
    pub async fn list_documents(&self, data_base: &Path, schema: &str) -> Result<Value> {
        self.invoke_json(
            "DATA LIST",
            args!["DATA", "LIST", "--dataBase", data_base, "--schema", schema],
            None,
        )
        .await
    }

    /// `DATA IMPORT` from an in-memory JSON document set
    pub async fn import(&self, data_base: &Path, schemas: &[&str], documents: &Value, mode: ImportMode) -> Result<()> {
        let input = json_temp_file("input")?;
        async_fs::write(input.path(), serde_json::to_vec(documents)?).await?;
        self.import_file(data_base, schemas, input.path(), DataFormat::Json, mode)
            .await
    }

    /// `DATA IMPORT` from a file in `format`
    pub async fn import_file(
        &self,
        data_base: &Path,
        schemas: &[&str],
        input: &Path,
        format: DataFormat,
        mode: ImportMode,
    ) -> Result<()> {
        let args = args![
            "DATA",
            "IMPORT",
            "--dataBase",
            data_base,
            schema_filter(schemas),
            "--input",
            input,
            "--inputFormat",
            format,
            "--mode",
            mode,
        ];
        self.invoke("DATA IMPORT", args, self.execution_timeout)
            .await
            .map(drop)
    }

    /// `DATA EXPORT` into memory as JSON
    pub async fn export(&self, data_base: &Path, schemas: &[&str]) -> Result<Value> {
        self.invoke_json(
            "DATA EXPORT",
            args!["DATA", "EXPORT", "--dataBase", data_base, schema_filter(schemas)],
            None,
        )
        .await
    }

    /// `DATA EXPORT` into a file in `format`
    pub async fn export_file(&self, data_base: &Path, schemas: &[&str], output: &Path, format: DataFormat) -> Result<()> {
        let args = args![
            "DATA",
            "EXPORT",
            "--dataBase",
            data_base,
            schema_filter(schemas),
            "--output",
            output,
            "--outputFormat",
            format,
        ];
        self.invoke("DATA EXPORT", args, self.execution_timeout)
            .await
            .map(drop)
    }

    /// `DATA VALIDATE`: the validation report
    pub async fn validate(&self, data_base: &Path, options: &[ValidationOption]) -> Result<Value> {
        let options = (!options.is_empty()).then(|| args!["--validationOptions", options]);
        self.invoke_json(
            "DATA VALIDATE",
            args!["DATA", "VALIDATE", "--dataBase", data_base, options],
            None,
        )
        .await
    }

    /// `DATA BACKUP` into `output`
    pub async fn backup(&self, data_base: &Path, output: &Path, format: DataFormat) -> Result<()> {
        let args = args![
            "DATA",
            "BACKUP",
            "--dataBase",
            data_base,
            "--output",
            output,
            "--outputFormat",
            format,
        ];
        self.invoke("DATA BACKUP", args, self.execution_timeout)
            .await
            .map(drop)
    }

    /// `DATA RESTORE` from `input`, replacing all data
    pub async fn restore(&self, data_base: &Path, input: &Path, format: DataFormat) -> Result<()> {
        let args = args![
            "DATA",
            "RESTORE",
            "--dataBase",
            data_base,
            "--input",
            input,
            "--inputFormat",
            format,
        ];
        self.invoke("DATA RESTORE", args, self.execution_timeout)
            .await
            .map(drop)
    }

    /// `DATA CREATEPATCH`: difference from `data_base` to `other`
    pub async fn create_patch(&self, data_base: &Path, other: &Path) -> Result<Value> {
        self.invoke_json(
            "DATA CREATEPATCH",
            args!["DATA", "CREATEPATCH", "--dataBase1", data_base, "--dataBase2", other],
            None,
        )
        .await
    }

    /// `DATA APPLYPATCH`: apply a patch produced by [`create_patch`](Self::create_patch)
    pub async fn apply_patch(&self, data_base: &Path, patch: &Value) -> Result<()> {
        let input = json_temp_file("patch")?;
        async_fs::write(input.path(), serde_json::to_vec(patch)?).await?;
        let args = args![
            "DATA",
            "APPLYPATCH",
            "--dataBase",
            data_base,
            "--input",
            input.path(),
            "--inputFormat",
            DataFormat::Json,
        ];
        self.invoke("DATA APPLYPATCH", args, self.execution_timeout)
            .await
            .map(drop)
    }

    /// `DATA VERSION`: version of the data format stored in `data_base`
    pub async fn data_version(&self, data_base: &Path) -> Result<String> {
        let result = self
            .invoke(
                "DATA VERSION",
                args!["DATA", "VERSION", "--dataBase", data_base],
                VERSION_TIMEOUT,
            )
            .await?;
        Ok(result.stdout().unwrap_or_default().trim().to_string())
    }

    /// `SERVER START`: long-lived server for `data_base`, announced in `lock_dir`
    pub async fn start_server(&self, data_base: &Path, listen_address: Url, lock_dir: &Path) -> Result<ServerProcess> {
        self.check_requirements()?;
        let command = self
            .command(args![
                "SERVER",
                "START",
                "--dataBase",
                data_base,
                "--listen",
                format_address(&listen_address),
            ])
            .capture_stdout(false)
            .capture_stderr(false)
            .build();
        let server = ServerProcess::start(&self.executor, &command, data_base, listen_address, lock_dir).await?;
        Ok(server)
    }

    /// `GENERATE CSHARPCODE`: game data access classes
    pub async fn generate_csharp_code(&self, data_base: &Path, options: &CodeGenerationOptions) -> Result<()> {
        let args = args![
            "GENERATE",
            "CSHARPCODE",
            "--dataBase",
            data_base,
            "--outputDirectory",
            &options.output_directory,
            options.namespace.as_deref().map(|n| args!["--namespace", n]),
            options
                .game_data_class_name
                .as_deref()
                .map(|n| args!["--gameDataClassName", n]),
            options
                .document_class_name
                .as_deref()
                .map(|n| args!["--documentClassName", n]),
            options.clear_output_directory.then_some("--clearOutputDirectory"),
        ];
        self.invoke("GENERATE CSHARPCODE", args, self.execution_timeout)
            .await
            .map(drop)
    }

    /// `GENERATE TEMPLATES`: customisable code generation templates
    pub async fn generate_templates(&self, output_directory: &Path) -> Result<()> {
        let args = args!["GENERATE", "TEMPLATES", "--outputDirectory", output_directory];
        self.invoke("GENERATE TEMPLATES", args, self.execution_timeout)
            .await
            .map(drop)
    }

    async fn invoke(&self, operation: &str, args: Argument, timeout: Duration) -> Result<RunResult> {
        self.check_requirements()?;
        let command = self.command(args).execution_timeout(timeout).build();
        debug!("Running tool: {}", command);

        let result = self.executor.run(&command).await?;
        match result.exit_status() {
            Some(status) if status.success() => {
                info!("{} finished", operation);
                Ok(result)
            }
            status => Err(Error::tool_failed(
                operation,
                status.and_then(|status| status.code),
                &result.stderr().unwrap_or_default(),
            )),
        }
    }

    async fn invoke_json(&self, operation: &str, args: Argument, input: Option<&Value>) -> Result<Value> {
        let input_file = match input {
            Some(value) => {
                let file = json_temp_file("input")?;
                async_fs::write(file.path(), serde_json::to_vec(value)?).await?;
                Some(file)
            }
            None => None,
        };
        let output_file = json_temp_file("output")?;

        let args = args![
            args,
            input_file
                .as_ref()
                .map(|file| args!["--input", file.path(), "--inputFormat", DataFormat::Json]),
            "--output",
            output_file.path(),
            "--outputFormat",
            DataFormat::Json,
        ];
        self.invoke(operation, args, self.execution_timeout).await?;

        let bytes = async_fs::read(output_file.path()).await?;
        parse_json_output(&bytes)
    }
}

fn schema_filter(schemas: &[&str]) -> Option<Argument> {
    (!schemas.is_empty()).then(|| args!["--schemas", schemas])
}

fn json_temp_file(role: &str) -> Result<NamedTempFile> {
    Ok(tempfile::Builder::new()
        .prefix(&format!("charon-{}-", role))
        .suffix(".json")
        .tempfile()?)
}

/// JSON written by the tool; an empty file means `null`
fn parse_json_output(bytes: &[u8]) -> Result<Value> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Parse `VERSION` output such as `2025.1.4` or `v1.2.3`
pub fn parse_version(output: &str) -> Result<Version> {
    let trimmed = output.trim();
    let candidate = trimmed.lines().last().unwrap_or_default().trim();
    let candidate = candidate.strip_prefix('v').unwrap_or(candidate);
    Version::parse(candidate).map_err(|source| Error::InvalidVersion {
        output: trimmed.to_string(),
        source,
    })
}

async fn forward_output(events: async_channel::Receiver<ProcessEvent>) {
    while let Ok(event) = events.recv().await {
        let line = event.data.unwrap_or_default();
        match event.event_type {
            ProcessEventType::Stdout => debug!(target: "charon::tool", pid = event.pid, "{}", line),
            ProcessEventType::Stderr => info!(target: "charon::tool", pid = event.pid, "stderr: {}", line),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.2.3\n").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("  v2025.1.4 ").unwrap(), Version::new(2025, 1, 4));
        assert_eq!(
            parse_version("Charon banner\n2024.3.0\n").unwrap(),
            Version::new(2024, 3, 0)
        );
        assert!(matches!(
            parse_version("not a version"),
            Err(Error::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_parse_json_output() {
        assert_eq!(parse_json_output(b"").unwrap(), Value::Null);
        assert_eq!(parse_json_output(b" \n").unwrap(), Value::Null);
        assert_eq!(
            parse_json_output(b"\xEF\xBB\xBF{\"Id\":\"Hero\"}").unwrap(),
            serde_json::json!({"Id": "Hero"})
        );
        assert!(matches!(parse_json_output(b"{oops"), Err(Error::Json(_))));
    }

    #[test]
    fn test_command_uses_runtime_and_environment() {
        let tool = CharonTool::new("/opt/charon/Charon.dll")
            .with_runtime("dotnet")
            .with_environment(ToolEnvironment {
                api_key: Some("key".into()),
                ..Default::default()
            });
        let command = tool.command(args!["VERSION"]).build();

        assert_eq!(command.get_program(), Path::new("dotnet"));
        assert_eq!(command.get_args(), ["/opt/charon/Charon.dll", "VERSION"]);
        assert_eq!(
            command.get_envs().get(crate::env::API_KEY_VAR).map(String::as_str),
            Some("key")
        );
    }

    #[test]
    fn test_schema_filter() {
        assert_eq!(schema_filter(&[]), None);
        assert_eq!(
            command_executor::args::flatten([schema_filter(&["Hero", "Item"])]),
            ["--schemas", "Hero", "Item"]
        );
    }

    #[test]
    fn test_missing_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let tool_path = dir.path().join("Charon");
        std::fs::write(&tool_path, "").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tool_path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let tool = CharonTool::new(&tool_path).with_runtime("definitely-not-a-runtime-4242");
        assert!(matches!(
            tool.check_requirements(),
            Err(Error::RuntimeMissing { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_runtime_found_on_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool_path = dir.path().join("Charon");
        std::fs::write(&tool_path, "").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tool_path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        CharonTool::new(&tool_path).with_runtime("sh").check_requirements().unwrap();
        CharonTool::new(&tool_path)
            .with_runtime("/bin/sh")
            .check_requirements()
            .unwrap();
    }
}
