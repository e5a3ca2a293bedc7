//! Integration tests for charon-config

use charon_config::{Config, ConfigError, parser};
use charon_orchestration::ToolLog;
use std::path::Path;
use std::time::Duration;

#[test]
fn test_full_config_parsing() {
    let yaml = r#"
version: "1.0"
log_level: debug

tool:
  executable: /opt/charon/Charon.dll
  runtime: dotnet
  execution_timeout: 300
  termination_timeout: 20
  log_output: true
  app_data_path: /srv/charon/data
  api_key: ${CHARON_TEST_KEY_UNLIKELY_TO_EXIST:-}
  server_address: ${CHARON_TEST_SERVER_UNLIKELY_TO_EXIST:-https://charon.example.com}
  log:
    target: console

paths:
  install_dir: /opt/charon
  lock_dir: /run/charon/locks
  shadow_dir: /var/cache/charon/shadow

servers:
  listen_address: http://127.0.0.1:9100
  grace_period: 5
  reconcile_interval: 10
  retention: 0
  shadow_copy: true

updates:
  feed_dir: /mnt/mirror/charon
  version: 2025.1.4
"#;

    let config = parser::parse_str(yaml).unwrap();
    assert_eq!(config.log_level.as_deref(), Some("debug"));
    assert_eq!(config.tool.runtime.as_deref(), Some("dotnet"));
    assert_eq!(config.tool.log, Some(ToolLog::Console));
    assert!(config.servers.shadow_copy);
    assert_eq!(config.retention(), Duration::ZERO);
    assert_eq!(config.grace_period(), Duration::from_secs(5));
    assert_eq!(config.updates.feed_dir.as_deref(), Some(Path::new("/mnt/mirror/charon")));
    assert_eq!(config.updates.version.as_ref().unwrap().to_string(), "2025.1.4");

    let paths = config.host_paths();
    assert_eq!(paths.install_dir, Path::new("/opt/charon"));
    assert_eq!(paths.executable, Path::new("/opt/charon/Charon.dll"));
    assert_eq!(paths.lock_dir, Path::new("/run/charon/locks"));

    let environment = config.tool_environment().unwrap();
    assert_eq!(environment.api_key, None);
    assert_eq!(
        environment.server_address.unwrap().host_str(),
        Some("charon.example.com")
    );

    let tool = config.charon_tool().unwrap();
    assert_eq!(tool.runtime(), Some("dotnet"));
    assert_eq!(tool.executable(), Path::new("/opt/charon/Charon.dll"));
    assert_eq!(config.listen_address().unwrap().port(), Some(9100));
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = parser::load(dir.path().join("charon.yaml")).unwrap();
    assert_eq!(config, Config::default());

    assert!(matches!(
        parser::parse_file(dir.path().join("charon.yaml")),
        Err(ConfigError::ReadError(_))
    ));
}

#[test]
fn test_load_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("charon.yaml");
    std::fs::write(&path, "version: \"1.0\"\nservers:\n  grace_period: 7\n").unwrap();

    let config = parser::load(&path).unwrap();
    assert_eq!(config.grace_period(), Duration::from_secs(7));
    assert_eq!(config.reconcile_interval(), Duration::from_secs(5));
}

#[test]
fn test_unresolved_variable_fails() {
    let yaml = "version: \"1.0\"\ntool:\n  api_key: ${CHARON_TEST_KEY_UNLIKELY_TO_EXIST}\n";
    match parser::parse_str(yaml) {
        Err(ConfigError::EnvVarNotFound(name)) => {
            assert_eq!(name, "CHARON_TEST_KEY_UNLIKELY_TO_EXIST")
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_yaml_errors_surface() {
    assert!(matches!(
        parser::parse_str("version: [unterminated"),
        Err(ConfigError::YamlError(_))
    ));
    assert!(matches!(
        parser::parse_str("version: \"1.0\"\nservers:\n  grace_period: soon\n"),
        Err(ConfigError::YamlError(_))
    ));
}

#[test]
fn test_round_trip_through_yaml() {
    let mut config = Config::default();
    config.tool.api_key = Some("k-1".into());
    config.servers.retention = 15;

    let yaml = serde_yaml::to_string(&config).unwrap();
    assert_eq!(parser::parse_str(&yaml).unwrap(), config);
}
