//! # Charon Host Configuration
//!
//! YAML configuration for the Charon tool host.
//!
//! A configuration file names the tool executable, the directories the host
//! keeps its installs, lock files and shadow copies in, the settings passed
//! to the tool through its environment, and the timing of server
//! management. Values may reference environment variables as `${VAR}` or
//! `${VAR:-default}`. Every section is optional; a missing file yields the
//! defaults.
//!
//! ```yaml
//! version: "1.0"
//! log_level: debug
//! tool:
//!   executable: /opt/charon/Charon
//!   execution_timeout: 300
//!   api_key: ${CHARON_API_KEY:-}
//!   log:
//!     target: file
//!     path: /var/log/charon/tool.log
//! servers:
//!   listen_address: http://127.0.0.1:8090
//!   grace_period: 5
//! updates:
//!   feed_dir: /mnt/mirror/charon
//! ```

#![warn(missing_docs)]

use charon_orchestration::ToolLog;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod parser;
pub mod resolver;

pub use resolver::HostPaths;

/// Supported configuration format version
pub const CONFIG_VERSION: &str = "1.0";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// Placeholder pattern failed to compile
    #[error("Invalid placeholder pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version
    #[serde(default = "default_version")]
    pub version: String,

    /// Host log level (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// How the tool is launched
    #[serde(default)]
    pub tool: ToolSettings,

    /// Host directories
    #[serde(default)]
    pub paths: PathSettings,

    /// Tool server management
    #[serde(default)]
    pub servers: ServerSettings,

    /// Tool installation and updates
    #[serde(default)]
    pub updates: UpdateSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: None,
            tool: ToolSettings::default(),
            paths: PathSettings::default(),
            servers: ServerSettings::default(),
            updates: UpdateSettings::default(),
        }
    }
}

/// Tool launch settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Tool executable, defaults to `Charon` in the install directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Runtime the executable is launched through, which must be on `PATH`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    /// Bound on data operations in seconds, 0 for unbounded
    #[serde(default)]
    pub execution_timeout: u64,

    /// Bound on draining output after exit in seconds, 0 for unbounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_timeout: Option<u64>,

    /// Forward tool output to the host log
    #[serde(default)]
    pub log_output: bool,

    /// Application data directory passed to the tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_data_path: Option<PathBuf>,

    /// API key for remote game data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Server for remote game data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,

    /// Where the tool writes its own log
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<ToolLog>,
}

/// Host directories, defaulting below the user's local data directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Where tool builds are installed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,

    /// Server lock files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<PathBuf>,

    /// Shadow copies of the executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_dir: Option<PathBuf>,
}

/// Tool server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address servers listen on
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Seconds a server gets to close before it is killed
    #[serde(default = "default_grace_period")]
    pub grace_period: u64,

    /// Seconds between server liveness refreshes
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval: u64,

    /// Seconds an exited server stays listed
    #[serde(default = "default_retention")]
    pub retention: u64,

    /// Run servers from a shadow copy of the executable
    #[serde(default)]
    pub shadow_copy: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            grace_period: default_grace_period(),
            reconcile_interval: default_reconcile_interval(),
            retention: default_retention(),
            shadow_copy: false,
        }
    }
}

/// Tool installation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSettings {
    /// Release mirror holding `manifest.json`, defaults to `releases` in the
    /// install directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_dir: Option<PathBuf>,

    /// Version to install instead of the latest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}
fn default_listen_address() -> String {
    "http://127.0.0.1:8090".to_string()
}
fn default_grace_period() -> u64 {
    2
}
fn default_reconcile_interval() -> u64 {
    5
}
fn default_retention() -> u64 {
    60
}
