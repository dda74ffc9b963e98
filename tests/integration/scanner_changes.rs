//! Scanner behavior across passes

use crate::integration::test_utils::write_file;
use roomsync::ignore::{IgnoreRules, MARKER_FILE_NAME};
use roomsync::scanner::Scanner;
use roomsync::tree::walker::WalkerConfig;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn scanner(root: &Path) -> Scanner {
    Scanner::new(root, IgnoreRules::defaults(), WalkerConfig::default())
}

/// Rewrite a file and push its modification time forward
fn rewrite(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel.trim_start_matches('/'));
    fs::write(&path, content).unwrap();
    let file = fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(10))
        .unwrap();
}

#[test]
fn test_modify_add_and_remove_between_scans() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "/a.txt", "a\n");
    write_file(temp_dir.path(), "/b.txt", "b\n");

    let mut scanner = scanner(temp_dir.path());
    let first = scanner.scan();
    assert_eq!(first.new_files, vec!["/a.txt".to_string(), "/b.txt".to_string()]);

    fs::remove_file(temp_dir.path().join("a.txt")).unwrap();
    rewrite(temp_dir.path(), "/b.txt", "b changed\n");
    write_file(temp_dir.path(), "/c.txt", "c\n");

    let second = scanner.scan();
    assert_eq!(second.removed_files, vec!["/a.txt".to_string()]);
    assert_eq!(second.new_files, vec!["/c.txt".to_string()]);
    assert_eq!(second.changed_files.len(), 2);
    assert_eq!(
        second.changed_files["/b.txt"].content.as_deref(),
        Some(&["b changed".to_string()][..])
    );
    assert!(second.new_directories.is_empty());
}

#[test]
fn test_unchanged_workspace_reports_nothing() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "/src/Main.java", "class Main {}\n");

    let mut scanner = scanner(temp_dir.path());
    scanner.scan();
    assert!(scanner.scan().is_empty());
}

#[test]
fn test_touch_without_content_change_is_silent() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "/src/Main.java", "class Main {}\n");

    let mut scanner = scanner(temp_dir.path());
    scanner.scan();
    rewrite(temp_dir.path(), "/src/Main.java", "class Main {}\n");
    assert!(scanner.scan().is_empty());
}

#[test]
fn test_removed_directory_cascades() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "/pkg/inner/Deep.java", "deep\n");
    write_file(temp_dir.path(), "/pkg/Top.java", "top\n");

    let mut scanner = scanner(temp_dir.path());
    scanner.scan();
    fs::remove_dir_all(temp_dir.path().join("pkg")).unwrap();

    let changes = scanner.scan();
    assert_eq!(
        changes.removed_directories,
        vec!["/pkg/inner/".to_string(), "/pkg/".to_string()]
    );
    assert_eq!(
        changes.removed_files,
        vec!["/pkg/inner/Deep.java".to_string(), "/pkg/Top.java".to_string()]
    );
}

#[test]
fn test_marker_and_ignored_paths_are_not_scanned() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), MARKER_FILE_NAME, "lab\n");
    write_file(temp_dir.path(), "/src/Main.java", "class Main {}\n");
    write_file(temp_dir.path(), "/src/Main.java~", "backup\n");
    write_file(temp_dir.path(), "/secret/key.txt", "hidden\n");

    let rules = IgnoreRules::from_lines(["/secret/", r"r.*~"]);
    let mut scanner = Scanner::new(temp_dir.path(), rules, WalkerConfig::default());
    let snapshot = scanner.scan();

    assert_eq!(snapshot.new_files, vec!["/src/Main.java".to_string()]);
    assert!(!snapshot.new_directories.contains(&"/secret/".to_string()));
}

#[test]
fn test_clear_reports_everything_again() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "/src/Main.java", "class Main {}\n");

    let mut scanner = scanner(temp_dir.path());
    let first = scanner.scan();
    scanner.clear();
    assert_eq!(scanner.known_count(), 0);
    assert_eq!(scanner.scan(), first);
}
