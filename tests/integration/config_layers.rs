//! Layered configuration: defaults, global file, explicit file

use crate::integration::test_utils::with_xdg_env;
use roomsync::config::{global_config_path, ConfigLoader, DEFAULT_PORT};
use std::fs;
use tempfile::TempDir;

fn write_global(contents: &str) {
    let path = global_config_path().unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_defaults_without_files() {
    let test_dir = TempDir::new().unwrap();
    let config = with_xdg_env(&test_dir, || ConfigLoader::load(None).unwrap());
    assert_eq!(config.hub.port, DEFAULT_PORT);
    assert_eq!(config.client.port, DEFAULT_PORT);
    assert!(config.hub.developer_key.is_empty());
}

#[test]
fn test_global_file_lives_under_xdg_config_home() {
    let test_dir = TempDir::new().unwrap();
    let path = with_xdg_env(&test_dir, || global_config_path().unwrap());
    assert_eq!(
        path,
        test_dir.path().join("config").join("roomsync").join("config.toml")
    );
}

#[test]
fn test_explicit_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    let explicit = test_dir.path().join("hub.toml");
    fs::write(&explicit, "[hub]\nport = 4200\n").unwrap();

    let config = with_xdg_env(&test_dir, || {
        write_global("[hub]\nport = 4100\ndeveloper_key = \"12345\"\n");
        ConfigLoader::load(Some(&explicit)).unwrap()
    });

    assert_eq!(config.hub.port, 4200);
    assert_eq!(config.hub.developer_key, "12345");
    assert!(config.validate_hub().is_ok());
}

#[test]
fn test_malformed_global_file_is_reported() {
    let test_dir = TempDir::new().unwrap();
    let result = with_xdg_env(&test_dir, || {
        write_global("[hub\nport = ");
        ConfigLoader::load(None)
    });
    assert!(result.is_err());
}
