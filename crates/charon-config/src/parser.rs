//! Configuration parser with environment variable substitution

use crate::{CONFIG_VERSION, Config, ConfigError, Result};
use regex::{Captures, Regex};
use std::path::Path;
use tracing::debug;
use url::Url;

/// Load `path`, falling back to the defaults when it does not exist
pub fn load(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => parse_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse a YAML configuration file
pub fn parse_file(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML configuration from a string
///
/// Placeholders are substituted in the raw text before parsing.
pub fn parse_str(content: &str) -> Result<Config> {
    let content = substitute_env_vars(content)?;
    let config: Config = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported version: {}, expected {}",
            config.version, CONFIG_VERSION
        )));
    }

    if let Some(level) = &config.log_level {
        if !["error", "warn", "info", "debug", "trace"].contains(&level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Unknown log level '{}'",
                level
            )));
        }
    }

    for (name, value) in [
        ("servers.grace_period", config.servers.grace_period),
        ("servers.reconcile_interval", config.servers.reconcile_interval),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than zero",
                name
            )));
        }
    }

    check_absolute_uri("servers.listen_address", &config.servers.listen_address)?;
    if let Some(address) = config.tool.server_address.as_deref().filter(|a| !a.is_empty()) {
        check_absolute_uri("tool.server_address", address)?;
    }

    if let Some(runtime) = &config.tool.runtime {
        if runtime.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tool.runtime must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Parse `value` as an absolute URI with a host
pub(crate) fn check_absolute_uri(name: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).map_err(|e| {
        ConfigError::ValidationError(format!("{} '{}' is not an absolute URI: {}", name, value, e))
    })?;
    if !url.has_host() {
        return Err(ConfigError::ValidationError(format!(
            "{} '{}' has no host",
            name, value
        )));
    }
    Ok(url)
}

/// Substitute environment variables in a string
pub fn substitute_env_vars(input: &str) -> Result<String> {
    substitute_with(input, |name| std::env::var(name).ok())
}

/// Substitute `${VAR}` and `${VAR:-default}` using `lookup`
///
/// Every unresolved variable is reported, not just the first.
pub fn substitute_with<F>(input: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")?;
    let mut missing = Vec::new();

    let result = re.replace_all(input, |cap: &Captures<'_>| {
        let name = &cap[1];
        match (lookup(name), cap.get(2)) {
            (Some(value), _) => value,
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }
    Ok(result.into_owned())
}
