//! Tests for configuration loading and music folder resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate BMA_MUSIC_FOLDER are marked with #[serial].

use bma_common::config::{
    load_config, load_toml_config, resolve_music_folder, TomlConfig, MUSIC_FOLDER_ENV,
};
use bma_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_missing_config_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let config = load_toml_config(&path).expect("Missing file should not be an error");
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_malformed_config_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"\n[[[").unwrap();

    let result = load_toml_config(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_explicit_path_is_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bma.toml");
    std::fs::write(&path, "music_folder = \"/data/music\"\nport = 8200\n").unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.music_folder, Some(PathBuf::from("/data/music")));
    assert_eq!(config.port, Some(8200));
    assert!(config.logging.level.is_none());
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(MUSIC_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        music_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_music_folder(Some(Path::new("/from/cli")), &toml);
    assert_eq!(resolved, Some(PathBuf::from("/from/cli")));

    env::remove_var(MUSIC_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(MUSIC_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        music_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_music_folder(None, &toml);
    assert_eq!(resolved, Some(PathBuf::from("/from/env")));

    env::remove_var(MUSIC_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_without_cli_or_env() {
    env::remove_var(MUSIC_FOLDER_ENV);
    let toml = TomlConfig {
        music_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_music_folder(None, &toml);
    assert_eq!(resolved, Some(PathBuf::from("/from/toml")));
}

#[test]
#[serial]
fn test_blank_env_is_ignored() {
    env::set_var(MUSIC_FOLDER_ENV, "   ");
    let toml = TomlConfig {
        music_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_music_folder(None, &toml);
    assert_eq!(resolved, Some(PathBuf::from("/from/toml")));

    env::remove_var(MUSIC_FOLDER_ENV);
}
