//! Environment variables handed to the tool process

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Overrides the tool's application data directory
pub const APP_DATA_PATH_VAR: &str = "CHARON_APP_DATA_PATH";
/// API key for remote game data
pub const API_KEY_VAR: &str = "CHARON_API_KEY";
/// Server used for remote game data
pub const SERVER_ADDRESS_VAR: &str = "CHARON_SERVER_ADDRESS";
/// Name of the tool's first log sink
pub const LOG_SINK_NAME_VAR: &str = "SERILOG__WRITETO__0__NAME";
/// File path of the tool's first log sink
pub const LOG_SINK_PATH_VAR: &str = "SERILOG__WRITETO__0__ARGS__PATH";

/// Where the tool writes its own log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "lowercase")]
pub enum ToolLog {
    /// Tool's default
    Default,
    /// Standard output of the tool
    Console,
    /// Append to a file
    File {
        /// Log file path
        path: PathBuf,
    },
}

/// Variables set on every tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolEnvironment {
    /// Application data directory override
    pub app_data_path: Option<PathBuf>,
    /// API key for remote game data
    pub api_key: Option<String>,
    /// Server address for remote game data
    pub server_address: Option<Url>,
    /// Tool log sink
    pub log: Option<ToolLog>,
}

impl ToolEnvironment {
    /// Variables to set, in a stable order
    pub fn vars(&self) -> Vec<(&'static str, String)> {
        let mut vars = Vec::new();
        if let Some(path) = &self.app_data_path {
            vars.push((APP_DATA_PATH_VAR, path.display().to_string()));
        }
        if let Some(key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            vars.push((API_KEY_VAR, key.to_string()));
        }
        if let Some(address) = &self.server_address {
            vars.push((SERVER_ADDRESS_VAR, address.to_string()));
        }
        match &self.log {
            None | Some(ToolLog::Default) => {}
            Some(ToolLog::Console) => vars.push((LOG_SINK_NAME_VAR, "Console".to_string())),
            Some(ToolLog::File { path }) => {
                vars.push((LOG_SINK_NAME_VAR, "File".to_string()));
                vars.push((LOG_SINK_PATH_VAR, path.display().to_string()));
            }
        }
        vars
    }
}
