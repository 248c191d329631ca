//! Configuration loading and graceful degradation tests
//!
//! Tests that manipulate GORO_CONFIG are marked with #[serial] so they run
//! sequentially, not in parallel.

use goro_common::config::{TomlConfig, CONFIG_ENV_VAR};
use goro_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(text.as_bytes()).expect("Failed to write config");
    file
}

#[test]
fn test_partial_file_keeps_defaults_for_missing_keys() {
    let config = TomlConfig::from_toml_str(
        r#"
        [ambient]
        sounds_folder = "/srv/goro/sounds"
        idle_min_ms = 60000
        idle_max_ms = 900000
        "#,
    )
    .unwrap();

    assert_eq!(config.ambient.sounds_folder, PathBuf::from("/srv/goro/sounds"));
    assert_eq!(config.ambient.idle_min_ms, 60_000);
    assert_eq!(config.ambient.idle_max_ms, 900_000);
    // Untouched keys fall back to built-in defaults
    assert_eq!(config.ambient.settle_ms, 500);
    assert_eq!(config.api.port, 5750);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_inverted_idle_range_is_rejected() {
    let result = TomlConfig::from_toml_str(
        r#"
        [ambient]
        idle_min_ms = 10
        idle_max_ms = 5
        "#,
    );

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_zero_attempts_is_rejected() {
    let result = TomlConfig::from_toml_str(
        r#"
        [resolver]
        direct_max_attempts = 0
        "#,
    );

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_reports_parse_error() {
    let result = TomlConfig::from_toml_str("[api\nport = ");
    assert!(matches!(result, Err(Error::Toml(_))));
}

#[test]
#[serial]
fn test_cli_path_takes_priority_over_env() {
    let cli_file = write_config("[api]\nport = 6001\n");
    let env_file = write_config("[api]\nport = 6002\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let config = TomlConfig::load(Some(cli_file.path())).unwrap();
    assert_eq!(config.api.port, 6001);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_names_config_file() {
    let env_file = write_config("[resolver]\ndirect_max_attempts = 4\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let config = TomlConfig::load(None).unwrap();
    assert_eq!(config.resolver.direct_max_attempts, 4);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_missing_file_is_an_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let result = TomlConfig::load(Some(std::path::Path::new("/nonexistent/goro/config.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}
