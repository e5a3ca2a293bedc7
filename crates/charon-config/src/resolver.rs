//! Resolving configured values into host settings
//!
//! Unset directories fall back to `<local data dir>/charon/...`, or the
//! system temp directory when the platform has no data directory.

use crate::parser::check_absolute_uri;
use crate::{Config, Result};
use charon_orchestration::{CharonTool, ToolEnvironment};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// File name of the tool executable
pub const TOOL_FILE_NAME: &str = if cfg!(windows) { "Charon.exe" } else { "Charon" };

/// Directories the host works in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    /// Tool executable
    pub executable: PathBuf,
    /// Directory tool builds are installed in
    pub install_dir: PathBuf,
    /// Server lock files
    pub lock_dir: PathBuf,
    /// Shadow copies of the executable
    pub shadow_dir: PathBuf,
    /// Release mirror the tool is installed from
    pub feed_dir: PathBuf,
}

/// Base directory for unset paths
pub fn default_base_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("charon")
}

impl Config {
    /// Directories with defaults applied
    ///
    /// An explicit executable determines the install directory unless that
    /// is configured as well.
    pub fn host_paths(&self) -> HostPaths {
        let base = default_base_dir();
        let install_dir = match (&self.paths.install_dir, &self.tool.executable) {
            (Some(dir), _) => dir.clone(),
            (None, Some(executable)) => executable
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| base.join("tool")),
            (None, None) => base.join("tool"),
        };
        let executable = self
            .tool
            .executable
            .clone()
            .unwrap_or_else(|| install_dir.join(TOOL_FILE_NAME));

        HostPaths {
            executable,
            feed_dir: self
                .updates
                .feed_dir
                .clone()
                .unwrap_or_else(|| install_dir.join("releases")),
            install_dir,
            lock_dir: self.paths.lock_dir.clone().unwrap_or_else(|| base.join("locks")),
            shadow_dir: self.paths.shadow_dir.clone().unwrap_or_else(|| base.join("shadow")),
        }
    }

    /// Variables handed to every tool invocation
    ///
    /// Empty strings, typically from `${VAR:-}`, count as unset.
    pub fn tool_environment(&self) -> Result<ToolEnvironment> {
        let server_address = match self.tool.server_address.as_deref() {
            Some(address) if !address.is_empty() => {
                Some(check_absolute_uri("tool.server_address", address)?)
            }
            _ => None,
        };
        Ok(ToolEnvironment {
            app_data_path: self
                .tool
                .app_data_path
                .clone()
                .filter(|path| !path.as_os_str().is_empty()),
            api_key: self.tool.api_key.clone().filter(|key| !key.is_empty()),
            server_address,
            log: self.tool.log.clone(),
        })
    }

    /// Tool wrapper for the configured executable
    pub fn charon_tool(&self) -> Result<CharonTool> {
        let paths = self.host_paths();
        let mut tool = CharonTool::new(paths.executable)
            .with_environment(self.tool_environment()?)
            .with_execution_timeout(Duration::from_secs(self.tool.execution_timeout))
            .with_output_logging(self.tool.log_output);
        if let Some(runtime) = &self.tool.runtime {
            tool = tool.with_runtime(runtime.clone());
        }
        if let Some(timeout) = self.tool.termination_timeout {
            tool = tool.with_termination_timeout(Duration::from_secs(timeout));
        }
        Ok(tool)
    }

    /// Address servers listen on
    pub fn listen_address(&self) -> Result<Url> {
        check_absolute_uri("servers.listen_address", &self.servers.listen_address)
    }

    /// Time a server gets to close before it is killed
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.servers.grace_period)
    }

    /// Interval between server liveness refreshes
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.servers.reconcile_interval)
    }

    /// How long exited servers stay listed
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.servers.retention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use charon_orchestration::ToolLog;
    use std::path::Path;

    #[test]
    fn test_default_paths_share_a_base() {
        let paths = Config::default().host_paths();
        let base = default_base_dir();
        assert_eq!(paths.install_dir, base.join("tool"));
        assert_eq!(paths.executable, base.join("tool").join(TOOL_FILE_NAME));
        assert_eq!(paths.lock_dir, base.join("locks"));
        assert_eq!(paths.shadow_dir, base.join("shadow"));
        assert_eq!(paths.feed_dir, base.join("tool").join("releases"));
    }

    #[test]
    fn test_executable_determines_install_dir() {
        let config = parse_str("version: \"1.0\"\ntool:\n  executable: /opt/charon/bin/Charon\n").unwrap();
        let paths = config.host_paths();
        assert_eq!(paths.install_dir, Path::new("/opt/charon/bin"));
        assert_eq!(paths.executable, Path::new("/opt/charon/bin/Charon"));
    }

    #[test]
    fn test_tool_environment() {
        let yaml = r#"
version: "1.0"
tool:
  api_key: ""
  server_address: https://api.example.com
  log:
    target: file
    path: /var/log/charon.log
"#;
        let environment = parse_str(yaml).unwrap().tool_environment().unwrap();
        assert_eq!(environment.api_key, None);
        assert_eq!(
            environment.server_address.unwrap().as_str(),
            "https://api.example.com/"
        );
        assert_eq!(
            environment.log,
            Some(ToolLog::File {
                path: "/var/log/charon.log".into()
            })
        );
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.grace_period(), Duration::from_secs(2));
        assert_eq!(config.reconcile_interval(), Duration::from_secs(5));
        assert_eq!(config.retention(), Duration::from_secs(60));
        assert_eq!(config.listen_address().unwrap().port(), Some(8090));
    }
}
