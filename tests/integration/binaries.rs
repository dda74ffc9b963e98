//! Startup failures of the two binaries
//!
//! Each run gets its own HOME and XDG directories so no user configuration
//! leaks in.

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run(bin: &str, args: &[&str], temp_dir: &TempDir) -> Output {
    let config_home = temp_dir.path().join("config");
    let data_home = temp_dir.path().join("data");
    let home = temp_dir.path().join("home");
    fs::create_dir_all(&config_home).unwrap();
    fs::create_dir_all(&data_home).unwrap();
    fs::create_dir_all(&home).unwrap();

    Command::new(bin)
        .env("XDG_CONFIG_HOME", config_home.as_os_str())
        .env("XDG_DATA_HOME", data_home.as_os_str())
        .env("HOME", home.as_os_str())
        .env_remove("ROOMSYNC_LOG")
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_hub_without_developer_key_exits() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(env!("CARGO_BIN_EXE_roomsync-hub"), &["--quiet"], &temp_dir);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Hub:"), "stderr={:?}", stderr);
}

#[test]
fn test_client_without_room_exits() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(env!("CARGO_BIN_EXE_roomsync"), &["--quiet"], &temp_dir);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("room must not be empty"), "stderr={:?}", stderr);
}

#[test]
fn test_client_refuses_foreign_directory() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();
    fs::write(workspace.join("unrelated.txt"), "mine\n").unwrap();

    let output = run(
        env!("CARGO_BIN_EXE_roomsync"),
        &["lab", "--quiet", "--workspace", workspace.to_str().unwrap()],
        &temp_dir,
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not empty or a valid project"), "stderr={:?}", stderr);
    assert!(!workspace.join(".roomsync").exists());
}
