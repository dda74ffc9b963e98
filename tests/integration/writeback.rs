//! Replica write-back of changesets produced by a source scan

use crate::integration::test_utils::{read_file, write_file};
use roomsync::client::writeback::WriteBack;
use roomsync::ignore::IgnoreRules;
use roomsync::protocol;
use roomsync::scanner::Scanner;
use roomsync::tree::walker::WalkerConfig;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn source_scanner(root: &Path) -> Scanner {
    Scanner::new(root, IgnoreRules::defaults(), WalkerConfig::default())
}

#[test]
fn test_replica_reproduces_source_content() {
    let source = TempDir::new().unwrap();
    let replica = TempDir::new().unwrap();
    write_file(source.path(), "/src/Main.java", "class Main {\n\n    int x;\n}\n");
    write_file(source.path(), "/src/empty.txt", "");
    write_file(source.path(), "/docs/guide/intro.txt", "Read me\n");

    let mut scanner = source_scanner(source.path());
    let line = protocol::encode_changeset(&scanner.scan()).unwrap();
    let changeset = protocol::decode_changeset(&line).unwrap();

    let writeback = WriteBack::new(replica.path(), &[], true);
    let outcome = writeback.apply(&changeset);

    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.files_written, 3);
    assert_eq!(outcome.directories_created, 3);
    assert!(outcome.reports.is_empty());
    for rel in ["/src/Main.java", "/src/empty.txt", "/docs/guide/intro.txt"] {
        assert_eq!(read_file(replica.path(), rel), read_file(source.path(), rel));
    }
}

#[test]
fn test_removals_reach_the_replica() {
    let source = TempDir::new().unwrap();
    let replica = TempDir::new().unwrap();
    write_file(source.path(), "/old/Gone.java", "gone\n");
    write_file(source.path(), "/Keep.java", "keep\n");

    let mut scanner = source_scanner(source.path());
    let writeback = WriteBack::new(replica.path(), &[], false);
    writeback.apply(&scanner.scan());
    assert!(replica.path().join("old/Gone.java").is_file());

    fs::remove_dir_all(source.path().join("old")).unwrap();
    let outcome = writeback.apply(&scanner.scan());

    assert_eq!(outcome.files_removed, 1);
    assert_eq!(outcome.directories_removed, 1);
    assert!(!replica.path().join("old").exists());
    assert!(replica.path().join("Keep.java").is_file());
}

#[test]
fn test_user_code_is_reported_and_kept() {
    let source = TempDir::new().unwrap();
    let replica = TempDir::new().unwrap();
    let template = "class Task {\n    // <USER CODE>\n    // </USER CODE>\n}\n";
    write_file(source.path(), "/Task.java", template);
    write_file(
        replica.path(),
        "/Task.java",
        "class Task {\n    // <USER CODE>\n    int mine = 1;\n    // </USER CODE>\n}\n",
    );

    let mut scanner = source_scanner(source.path());
    let writeback = WriteBack::new(replica.path(), &[], false);
    let outcome = writeback.apply(&scanner.scan());

    assert_eq!(outcome.reports.len(), 1);
    let report = &outcome.reports[0];
    assert_eq!(report.path, "/Task.java");
    assert_eq!(report.regions["0"], vec!["    int mine = 1;".to_string()]);
    assert!(read_file(replica.path(), "/Task.java")
        .unwrap()
        .contains("int mine = 1;"));
}

#[test]
fn test_directory_with_local_files_survives_removal() {
    let source = TempDir::new().unwrap();
    let replica = TempDir::new().unwrap();
    write_file(source.path(), "/pkg/A.java", "a\n");

    let mut scanner = source_scanner(source.path());
    let writeback = WriteBack::new(replica.path(), &[], false);
    writeback.apply(&scanner.scan());
    write_file(replica.path(), "/pkg/local.txt", "mine\n");

    fs::remove_dir_all(source.path().join("pkg")).unwrap();
    let outcome = writeback.apply(&scanner.scan());

    assert_eq!(outcome.files_removed, 1);
    assert_eq!(outcome.failed, vec!["/pkg/".to_string()]);
    assert_eq!(read_file(replica.path(), "/pkg/local.txt").as_deref(), Some("mine\n"));
}
