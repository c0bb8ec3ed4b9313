//! Tests for config file loading
//!
//! Covers:
//! - Explicit config file must exist and parse
//! - Full TOML schema round-trips into TomlConfig
//! - Malformed TOML is reported as a Config error

use emuws_common::config::TomlConfig;
use emuws_common::Error;
use std::path::PathBuf;

#[test]
fn test_explicit_config_file_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        repositories_path = "/srv/repositories"
        media_file_base_url = "https://emu.example.org"
        database_path = "/var/lib/emuws/registry.db"
        port = 18000
        bind_address = "127.0.0.1"
        emu_db_name = "DEMO"
        stage_in_git = false
        log_level = "debug"
        "#,
    )
    .unwrap();

    let config = TomlConfig::load(Some(&path)).unwrap();

    assert_eq!(config.repositories_path, Some(PathBuf::from("/srv/repositories")));
    assert_eq!(config.media_file_base_url.as_deref(), Some("https://emu.example.org"));
    assert_eq!(config.database_path, Some(PathBuf::from("/var/lib/emuws/registry.db")));
    assert_eq!(config.port, Some(18000));
    assert_eq!(config.bind_address.as_deref(), Some("127.0.0.1"));
    assert_eq!(config.emu_db_name.as_deref(), Some("DEMO"));
    assert_eq!(config.stage_in_git, Some(false));
    assert_eq!(config.log_level.as_deref(), Some("debug"));
}

#[test]
fn test_missing_explicit_config_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = TomlConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "unexpected error: {err}");
}

#[test]
fn test_malformed_config_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let err = TomlConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "unexpected error: {err}");
}

#[test]
fn test_empty_config_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();

    assert_eq!(TomlConfig::load(Some(&path)).unwrap(), TomlConfig::default());
}
