//! Diff and apply over generated trees

use proptest::prelude::*;
use roomsync::tree::{Changeset, FileEntry, Repository};
use roomsync::types::Role;
use std::collections::{BTreeMap, BTreeSet};

const DIRS: [&str; 4] = ["/", "/a/", "/b/", "/a/c/"];

fn ancestors(dir: &str) -> &'static [&'static str] {
    match dir {
        "/a/" => &["/", "/a/"],
        "/b/" => &["/", "/b/"],
        "/a/c/" => &["/", "/a/", "/a/c/"],
        _ => &["/"],
    }
}

type FileSpec = (usize, usize, Vec<String>);

fn file_specs() -> impl Strategy<Value = Vec<FileSpec>> {
    prop::collection::vec(
        (
            0usize..DIRS.len(),
            0usize..3,
            prop::collection::vec("[a-z ;]{0,8}", 0..4),
        ),
        0..8,
    )
}

fn build(files: &[FileSpec]) -> Repository {
    let mut directories = BTreeSet::new();
    let mut changed_files = BTreeMap::new();
    for (dir, index, lines) in files {
        let dir = DIRS[*dir];
        for ancestor in ancestors(dir) {
            directories.insert(ancestor.to_string());
        }
        changed_files.insert(
            format!("{}File{}.java", dir, index),
            FileEntry::from_lines(lines.clone()),
        );
    }

    let mut snapshot = Changeset::new();
    snapshot.new_directories = directories.into_iter().collect();
    snapshot.new_files = changed_files.keys().cloned().collect();
    snapshot.changed_files = changed_files;
    Repository::from_snapshot(&snapshot, Role::Source).unwrap()
}

#[test]
fn test_diff_then_apply_reaches_target_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(file_specs(), file_specs()), |(local, remote)| {
            let mut tree = build(&local);
            let target = build(&remote);

            let changeset = tree.diff(&target);
            tree.apply_changeset(&changeset).unwrap();

            prop_assert_eq!(&tree, &target);
            prop_assert!(tree.diff(&target).is_empty());
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_snapshot_rebuilds_same_tree_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&file_specs(), |files| {
            let tree = build(&files);
            let rebuilt = Repository::from_snapshot(&tree.to_snapshot(), Role::Source).unwrap();
            prop_assert_eq!(rebuilt, tree);
            Ok(())
        })
        .unwrap();
}
