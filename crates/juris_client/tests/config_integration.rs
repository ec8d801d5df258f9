//! Integration tests for config load/save.

use juris_client::{config, ConfigError, Settings};
use predicates::prelude::*;

#[test]
fn load_existing_yaml_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        r#"
api_url: "https://juris.example.com/api/"
retrieve:
  k: 8
  temperature: 0.3
log_level: DEBUG
timeouts:
  probe_secs: 2
  stream_secs: 120
readiness:
  max_wait_secs: 30
  interval_secs: 3
"#,
    )
    .unwrap();

    let settings = config::load(&config_path).expect("load should succeed");
    assert_eq!(settings.api_url(), "https://juris.example.com/api");
    assert_eq!(settings.retrieve.k, 8);
    assert_eq!(settings.retrieve.temperature, 0.3);
    assert_eq!(settings.log_directive(), "debug");
    assert_eq!(settings.probe_timeout().as_secs(), 2);
    assert_eq!(settings.stream_timeout().as_secs(), 120);
    assert_eq!(settings.wait_policy().attempts(), 10);
    settings.validate().expect("config should be valid");
}

#[test]
fn partial_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "retrieve:\n  k: 3\n").unwrap();

    let settings = config::load(&config_path).expect("load should succeed");
    let defaults = Settings::default();
    assert_eq!(settings.retrieve.k, 3);
    assert_eq!(settings.retrieve.temperature, defaults.retrieve.temperature);
    assert_eq!(settings.api_url, defaults.api_url);
    assert_eq!(settings.timeouts, defaults.timeouts);
    assert_eq!(settings.readiness, defaults.readiness);
}

#[test]
fn missing_file_is_an_error_unless_defaults_requested() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("absent.yaml");

    assert!(matches!(
        config::load(&config_path),
        Err(ConfigError::Io(_))
    ));
    let settings = config::load_or_default(&config_path).expect("defaults");
    assert_eq!(settings, Settings::default());
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "retrieve: [unterminated").unwrap();

    assert!(matches!(
        config::load(&config_path),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn save_creates_directory_and_file_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("juris");
    let config_path = config_dir.join("config.yaml");
    assert!(!config_dir.exists(), "config dir should not exist yet");

    let mut settings = Settings::default();
    settings.api_url = "https://juris.example.com/api".into();
    settings.retrieve.k = 20;

    config::save(&config_path, &settings).expect("save should succeed");
    let pred = predicates::path::exists();
    assert!(pred.eval(&config_path), "config file should exist after save");

    let contents = std::fs::read_to_string(&config_path).unwrap();
    assert!(predicates::str::contains("api_url").eval(&contents));
    assert!(predicates::str::contains("retrieve:").eval(&contents));

    let reloaded = config::load(&config_path).expect("reload should succeed");
    assert_eq!(reloaded, settings);
}

/// Config path resolves to `~/.juris/config.yaml` using the current platform's home dir.
#[test]
fn default_config_path_uses_home_directory() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().to_str().unwrap().to_string();

    let key = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    let original = std::env::var(key).ok();

    std::env::set_var(key, &home);
    let path = config::default_config_path();
    match original {
        Some(v) => std::env::set_var(key, v),
        None => std::env::remove_var(key),
    }

    let path = path.expect("should resolve a config path");
    let expected = dir.path().join(".juris").join("config.yaml");
    assert_eq!(path, expected);
}
