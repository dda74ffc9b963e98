//! Properties of the line checksum

use proptest::prelude::*;
use roomsync::tree::hasher::compute_lines_checksum;

#[test]
fn test_blank_line_changes_checksum() {
    let empty: Vec<String> = Vec::new();
    assert_ne!(compute_lines_checksum(&[""][..]), compute_lines_checksum(&empty));
}

#[test]
fn test_checksum_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(".{0,20}", 0..10), |lines| {
            let first = compute_lines_checksum(&lines);
            let second = compute_lines_checksum(&lines.clone());
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), 32);
            prop_assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_appended_blank_line_moves_digest_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec("[a-z]{1,12}", 0..10), |lines| {
            let mut padded = lines.clone();
            padded.push(String::new());
            prop_assert_ne!(compute_lines_checksum(&lines), compute_lines_checksum(&padded));
            Ok(())
        })
        .unwrap();
}

/// Non-empty lines hash like their concatenation
#[test]
fn test_line_boundaries_do_not_matter_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec("[a-z]{1,12}", 1..10), |lines| {
            let joined = vec![lines.concat()];
            prop_assert_eq!(compute_lines_checksum(&lines), compute_lines_checksum(&joined));
            Ok(())
        })
        .unwrap();
}
