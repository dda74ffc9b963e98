//! In-memory tree model with invariant checks and diff/apply
//!
//! A [`Repository`] holds a set of directory paths and a map of file paths to
//! [`FileEntry`]. Three invariants hold after every successful operation:
//!
//! - every directory other than `/` has its parent directory present,
//! - every file has its containing directory present,
//! - no path is both a file and a directory.
//!
//! Mutation only happens through [`Repository::apply_changeset`], which is
//! all-or-nothing: on failure the repository is left exactly as it was.

use crate::error::TreeError;
use crate::tree::changeset::{sort_ascending, sort_descending, Changeset, FileEntry};
use crate::tree::path::{self, ROOT};
use crate::types::Role;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Repository {
    directories: BTreeSet<String>,
    files: BTreeMap<String, FileEntry>,
}

impl Repository {
    /// Create an empty repository (no directories, not even the root)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from a snapshot
    ///
    /// The snapshot's `new_files` must be exactly the keys of `changed_files`,
    /// and a source snapshot may not carry removals.
    pub fn from_snapshot(snapshot: &Changeset, role: Role) -> Result<Self, TreeError> {
        if snapshot.has_removals() {
            return Err(match role {
                Role::Source => TreeError::RemovalInSnapshot,
                Role::Replica => TreeError::ForbiddenRemoval(first_removal(snapshot)),
            });
        }

        let mut new_files = snapshot.new_files.clone();
        new_files.sort();
        if new_files.len() != snapshot.changed_files.len()
            || !new_files.iter().eq(snapshot.changed_files.keys())
        {
            return Err(TreeError::SnapshotMismatch);
        }

        let mut repository = Repository::new();
        for dir in &snapshot.new_directories {
            if !repository.directories.insert(dir.clone()) {
                return Err(TreeError::DirectoryExists(dir.clone()));
            }
        }
        repository.files = snapshot.changed_files.clone();
        repository.check_invariants()?;

        debug!(
            role = %role,
            directories = repository.directories.len(),
            files = repository.files.len(),
            "Built tree from snapshot"
        );
        Ok(repository)
    }

    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.directories.iter().map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &FileEntry)> {
        self.files.iter().map(|(path, entry)| (path.as_str(), entry))
    }

    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn contains_directory(&self, path: &str) -> bool {
        self.directories.contains(path)
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }

    /// Changeset that turns `self` into `remote`
    ///
    /// Entries for new and changed files are copied in full from `remote`.
    pub fn diff(&self, remote: &Repository) -> Changeset {
        let mut changeset = Changeset::new();

        for dir in remote.directories.difference(&self.directories) {
            changeset.new_directories.push(dir.clone());
        }
        for dir in self.directories.difference(&remote.directories) {
            changeset.removed_directories.push(dir.clone());
        }

        for (path, entry) in &remote.files {
            match self.files.get(path) {
                None => {
                    changeset.new_files.push(path.clone());
                    changeset.changed_files.insert(path.clone(), entry.clone());
                }
                Some(local) if local.hash != entry.hash => {
                    changeset.changed_files.insert(path.clone(), entry.clone());
                }
                Some(_) => {}
            }
        }
        for path in self.files.keys() {
            if !remote.files.contains_key(path) {
                changeset.removed_files.push(path.clone());
            }
        }

        sort_ascending(&mut changeset.new_directories);
        sort_ascending(&mut changeset.new_files);
        sort_descending(&mut changeset.removed_directories);
        sort_descending(&mut changeset.removed_files);
        changeset
    }

    /// Apply a changeset, validating every step
    ///
    /// Steps run in order: add new directories, remove removed directories,
    /// install changed files, remove removed files, then check the invariants
    /// over the whole tree. Any failure leaves `self` untouched.
    pub fn apply_changeset(&mut self, changeset: &Changeset) -> Result<(), TreeError> {
        let mut next = self.clone();

        for dir in &changeset.new_directories {
            if !next.directories.insert(dir.clone()) {
                return Err(TreeError::DirectoryExists(dir.clone()));
            }
        }
        for dir in &changeset.removed_directories {
            if !next.directories.remove(dir) {
                return Err(TreeError::DirectoryMissing(dir.clone()));
            }
        }

        for file in &changeset.new_files {
            if !changeset.changed_files.contains_key(file) {
                return Err(TreeError::NewFileNotChanged(file.clone()));
            }
        }
        for file in changeset.changed_files.keys() {
            if !changeset.new_files.contains(file) && !next.files.contains_key(file) {
                return Err(TreeError::ChangedFileUntracked(file.clone()));
            }
        }
        for (file, entry) in &changeset.changed_files {
            next.files.insert(file.clone(), entry.clone());
        }

        for file in &changeset.removed_files {
            if next.files.remove(file).is_none() {
                return Err(TreeError::FileMissing(file.clone()));
            }
        }

        next.check_invariants()?;
        *self = next;
        Ok(())
    }

    /// Verify the structural invariants over the whole tree
    pub fn check_invariants(&self) -> Result<(), TreeError> {
        for dir in &self.directories {
            if let Some(parent) = path::parent_directory(dir) {
                if !self.directories.contains(parent) {
                    return Err(TreeError::ParentMissing {
                        path: dir.clone(),
                        parent: parent.to_string(),
                    });
                }
            }
        }

        for file in self.files.keys() {
            let parent = path::parent_directory(file).unwrap_or(ROOT);
            if !self.directories.contains(parent) {
                return Err(TreeError::ParentMissing {
                    path: file.clone(),
                    parent: parent.to_string(),
                });
            }
            if self.directories.contains(&format!("{}/", file)) {
                return Err(TreeError::PathCollision(file.clone()));
            }
        }
        Ok(())
    }

    /// Full snapshot of this repository (every path reported as new)
    pub fn to_snapshot(&self) -> Changeset {
        Repository::new().diff(self)
    }

    /// Human-readable size, e.g. `3 files and 2 directories`
    pub fn summary(&self) -> String {
        format!(
            "{} files and {} directories",
            self.files.len(),
            self.directories.len()
        )
    }
}

fn first_removal(changeset: &Changeset) -> String {
    changeset
        .removed_files
        .iter()
        .chain(changeset.removed_directories.iter())
        .next()
        .cloned()
        .unwrap_or_default()
}
