//! Tree construction, diff and wire round trips over real workspaces

use crate::integration::test_utils::write_file;
use roomsync::ignore::IgnoreRules;
use roomsync::protocol;
use roomsync::scanner::Scanner;
use roomsync::tree::walker::WalkerConfig;
use roomsync::tree::Repository;
use roomsync::types::Role;
use tempfile::TempDir;

fn scan_repository(root: &std::path::Path) -> Repository {
    let mut scanner = Scanner::new(root, IgnoreRules::defaults(), WalkerConfig::default());
    let snapshot = scanner.scan();
    Repository::from_snapshot(&snapshot, Role::Source).unwrap()
}

#[test]
fn test_snapshot_contains_root_and_nested_paths() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "/src/Main.java", "class Main {}\n");
    write_file(temp_dir.path(), "/src/util/Util.java", "class Util {}\n");
    write_file(temp_dir.path(), "/README.txt", "hello\n");

    let tree = scan_repository(temp_dir.path());
    assert!(tree.contains_directory("/"));
    assert!(tree.contains_directory("/src/"));
    assert!(tree.contains_directory("/src/util/"));
    assert!(tree.contains_file("/src/util/Util.java"));
    assert_eq!(tree.file_count(), 3);
    tree.check_invariants().unwrap();
}

#[test]
fn test_empty_replica_catches_up_through_the_wire() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "/src/Main.java", "class Main {\n\n}\n");
    write_file(temp_dir.path(), "/notes.txt", "");
    let canonical = scan_repository(temp_dir.path());

    let mut replica = Repository::new();
    let line = protocol::encode_changeset(&replica.diff(&canonical)).unwrap();
    let received = protocol::decode_changeset(&line).unwrap();
    replica.apply_changeset(&received).unwrap();

    assert_eq!(replica, canonical);
    assert!(replica.diff(&canonical).is_empty());
}

#[test]
fn test_diff_between_two_workspaces() {
    let before = TempDir::new().unwrap();
    write_file(before.path(), "/a/One.java", "one\n");
    write_file(before.path(), "/b/Two.java", "two\n");

    let after = TempDir::new().unwrap();
    write_file(after.path(), "/a/One.java", "one changed\n");
    write_file(after.path(), "/c/Three.java", "three\n");

    let mut tree = scan_repository(before.path());
    let target = scan_repository(after.path());
    let changeset = tree.diff(&target);

    assert_eq!(changeset.new_directories, vec!["/c/".to_string()]);
    assert_eq!(changeset.removed_directories, vec!["/b/".to_string()]);
    assert_eq!(changeset.new_files, vec!["/c/Three.java".to_string()]);
    assert_eq!(changeset.removed_files, vec!["/b/Two.java".to_string()]);
    assert!(changeset.changed_files.contains_key("/a/One.java"));

    tree.apply_changeset(&changeset).unwrap();
    assert_eq!(tree, target);
}

#[test]
fn test_replica_snapshot_drops_content() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "/src/Main.java", "class Main {}\n");
    let mut scanner = Scanner::new(
        temp_dir.path(),
        IgnoreRules::defaults(),
        WalkerConfig::default(),
    );
    let snapshot = scanner.scan();

    let line = protocol::encode_replica_snapshot(&snapshot).unwrap();
    assert!(!line.contains("class Main"));

    let decoded = protocol::decode_replica_snapshot(&line).unwrap();
    let entry = &decoded.changed_files["/src/Main.java"];
    assert!(entry.content.is_none());
    assert_eq!(entry.hash, snapshot.changed_files["/src/Main.java"].hash);
}
