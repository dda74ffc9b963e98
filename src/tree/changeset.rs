//! Changesets: the difference between two trees
//!
//! A changeset is also the shape of a snapshot (a changeset against the
//! empty tree, with no removals).

use std::collections::BTreeMap;

/// Checksum plus optional content of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub hash: String,
    /// Lines of the file; absent when only the hash is being tracked
    pub content: Option<Vec<String>>,
}

impl FileEntry {
    pub fn new(hash: impl Into<String>, content: Vec<String>) -> Self {
        Self {
            hash: hash.into(),
            content: Some(content),
        }
    }

    pub fn hash_only(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            content: None,
        }
    }

    /// Build an entry from lines, computing the checksum
    pub fn from_lines(lines: Vec<String>) -> Self {
        let hash = crate::tree::hasher::compute_lines_checksum(&lines);
        Self::new(hash, lines)
    }
}

/// Set of tree modifications
///
/// Application order: add new directories, remove removed directories,
/// install changed files, remove removed files. `new_directories` is kept
/// in ascending `(length, path)` order so parents precede children, and
/// removals in descending order so children precede parents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    pub new_directories: Vec<String>,
    pub new_files: Vec<String>,
    pub changed_files: BTreeMap<String, FileEntry>,
    pub removed_directories: Vec<String>,
    pub removed_files: Vec<String>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when applying this changeset would change nothing
    pub fn is_empty(&self) -> bool {
        self.new_directories.is_empty()
            && self.new_files.is_empty()
            && self.changed_files.is_empty()
            && self.removed_directories.is_empty()
            && self.removed_files.is_empty()
    }

    pub fn has_removals(&self) -> bool {
        !self.removed_directories.is_empty() || !self.removed_files.is_empty()
    }

    /// Copy of this changeset with file contents dropped (hashes only)
    pub fn without_content(&self) -> Changeset {
        Changeset {
            new_directories: self.new_directories.clone(),
            new_files: self.new_files.clone(),
            changed_files: self
                .changed_files
                .iter()
                .map(|(path, entry)| (path.clone(), FileEntry::hash_only(entry.hash.clone())))
                .collect(),
            removed_directories: self.removed_directories.clone(),
            removed_files: self.removed_files.clone(),
        }
    }

    /// Number of touched paths, for log lines
    pub fn len(&self) -> usize {
        self.new_directories.len()
            + self.changed_files.len()
            + self.removed_directories.len()
            + self.removed_files.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "+{} dirs, +{} files, ~{} changed, -{} dirs, -{} files",
            self.new_directories.len(),
            self.new_files.len(),
            self.changed_files.len(),
            self.removed_directories.len(),
            self.removed_files.len()
        )
    }
}

/// Ascending by `(length, path)`
pub fn sort_ascending(paths: &mut [String]) {
    paths.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
}

/// Descending by `(length, path)`
pub fn sort_descending(paths: &mut [String]) {
    paths.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| b.cmp(a)));
}
