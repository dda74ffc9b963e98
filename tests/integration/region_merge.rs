//! Region merge against files on disk

use roomsync::merge::{merge_into_file, merge_texts};
use std::fs;
use tempfile::TempDir;

const CANONICAL_V1: &str = "\
public class Task {
    public int solve() {
        // <USER CODE> solve
        return 0;
        // </USER CODE>
    }
}";

const CANONICAL_V2: &str = "\
public class Task {
    /** Return the answer. */
    public int solve() {
        // <USER CODE> solve
        return 0;
        // </USER CODE>
    }

    // <USER CODE> helpers
    // </USER CODE>
}";

fn lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

#[test]
fn test_local_edits_survive_canonical_update() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Task.java");

    merge_into_file(&path, &lines(CANONICAL_V1)).unwrap();
    let edited = fs::read_to_string(&path)
        .unwrap()
        .replace("return 0;", "return 42;");
    fs::write(&path, edited).unwrap();

    let incoming = CANONICAL_V1.replace("public class", "public final class");
    let outcome = merge_into_file(&path, &lines(&incoming)).unwrap();

    assert!(!outcome.structure_mismatch);
    assert_eq!(outcome.region_bodies(), vec!["        return 42;".to_string()]);
    let on_disk = fs::read_to_string(&path).unwrap();
    assert!(on_disk.starts_with("public final class Task {"));
    assert!(on_disk.contains("return 42;"));
    assert!(!on_disk.contains("return 0;"));
}

#[test]
fn test_added_region_replaces_local_edits() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Task.java");
    fs::write(&path, CANONICAL_V1.replace("return 0;", "return 42;")).unwrap();

    let outcome = merge_into_file(&path, &lines(CANONICAL_V2)).unwrap();

    assert!(outcome.structure_mismatch);
    assert_eq!(outcome.regions, vec![Vec::<String>::new(); 2]);
    let on_disk = fs::read_to_string(&path).unwrap();
    assert_eq!(on_disk, format!("{}\n", CANONICAL_V2));
}

#[test]
fn test_merge_into_missing_file_creates_it() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Fresh.java");

    let outcome = merge_into_file(&path, &lines(CANONICAL_V2)).unwrap();

    assert_eq!(outcome.regions, vec![Vec::<String>::new(); 2]);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        format!("{}\n", CANONICAL_V2)
    );
}

#[test]
fn test_text_merge_keeps_outside_from_incoming() {
    let current = "header A\n// <USER CODE>\nmine\n// </USER CODE>\nfooter A";
    let incoming = "header B\n// <USER CODE>\ntheirs\n// </USER CODE>\nfooter B";

    let outcome = merge_texts(current, incoming);
    assert_eq!(
        outcome.text(),
        "header B\n// <USER CODE>\nmine\n// </USER CODE>\nfooter B"
    );
}
