//! Workspace scanner
//!
//! Keeps a cache of every path seen in the previous pass (directories, and
//! files with their checksum and modification time) and turns each new walk
//! of the workspace into a [`Changeset`] against that cache.
//!
//! A known file is only re-read when its modification time moved, and only
//! reported when its checksum actually changed. Per-file failures leave the
//! cached state untouched so the next pass retries them.

use crate::ignore::IgnoreRules;
use crate::tree::changeset::{sort_ascending, sort_descending, Changeset, FileEntry};
use crate::tree::hasher;
use crate::tree::path::{self, ROOT};
use crate::tree::walker::{Entry, SkipReason, WalkOutcome, WalkerConfig, Walker};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, instrument, warn};

/// What the scanner remembers about one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedEntry {
    Directory,
    File { hash: String, modified: SystemTime },
}

/// Stateful scanner over one workspace directory
pub struct Scanner {
    root: PathBuf,
    rules: IgnoreRules,
    config: WalkerConfig,
    known: BTreeMap<String, CachedEntry>,
    warned: HashSet<String>,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>, rules: IgnoreRules, config: WalkerConfig) -> Self {
        Self {
            root: root.into(),
            rules,
            config,
            known: BTreeMap::new(),
            warned: HashSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Forget everything; the next scan reports the whole workspace as new
    pub fn clear(&mut self) {
        self.known.clear();
        self.warned.clear();
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    /// Walk the workspace and report changes since the previous pass
    ///
    /// The first pass after construction or [`Scanner::clear`] is a full
    /// snapshot: every path is new and nothing is removed.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn scan(&mut self) -> Changeset {
        let outcome = Walker::new(self.root.clone(), &self.rules, &self.config).walk();
        self.apply_walk(outcome)
    }

    /// Turn one walk into a changeset against the cache
    ///
    /// Paths listed as unreadable keep their cached state, and so does
    /// everything known below an unreadable directory.
    fn apply_walk(&mut self, outcome: WalkOutcome) -> Changeset {
        for error in &outcome.errors {
            warn!(error = %error, "Skipping workspace entry");
        }
        for (rel, reason) in &outcome.skipped {
            if self.warned.insert(rel.clone()) {
                match reason {
                    SkipReason::TooLarge { size, max } => {
                        warn!(path = %rel, size, max, "Ignoring file: too large")
                    }
                    SkipReason::NotText => warn!(path = %rel, "Ignoring file: not a text file"),
                }
            }
        }

        let mut changeset = Changeset::new();
        let mut to_remove: BTreeSet<String> = self.known.keys().cloned().collect();

        for entry in outcome.entries {
            to_remove.remove(entry.rel());
            match entry {
                Entry::Directory { rel, .. } => {
                    if !self.known.contains_key(&rel) {
                        self.known.insert(rel.clone(), CachedEntry::Directory);
                        changeset.new_directories.push(rel);
                    }
                }
                Entry::File {
                    rel,
                    path,
                    modified,
                } => self.scan_file(rel, &path, modified, &mut changeset),
            }
        }

        let mut removed = cascade_removals(&self.known, to_remove);
        spare_unreadable(&mut removed, &outcome.unreadable);
        for rel in removed {
            match self.known.remove(&rel) {
                Some(CachedEntry::Directory) => changeset.removed_directories.push(rel),
                Some(CachedEntry::File { .. }) => changeset.removed_files.push(rel),
                None => {}
            }
        }

        sort_ascending(&mut changeset.new_directories);
        sort_ascending(&mut changeset.new_files);
        sort_descending(&mut changeset.removed_files);
        sort_descending(&mut changeset.removed_directories);

        if !changeset.is_empty() {
            debug!(summary = %changeset.summary(), "Scan found changes");
        }
        changeset
    }

    fn scan_file(&mut self, rel: String, path: &Path, modified: SystemTime, changeset: &mut Changeset) {
        // File keys never end with `/`, so they cannot alias a cached directory.
        let previous = match self.known.get(&rel) {
            Some(CachedEntry::File {
                hash,
                modified: cached,
            }) => {
                if *cached == modified {
                    return;
                }
                Some(hash.clone())
            }
            Some(CachedEntry::Directory) | None => None,
        };

        let lines = match hasher::read_lines(path) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(path = %rel, error = %e, "Failed to read file, retrying next scan");
                return;
            }
        };
        let hash = hasher::compute_lines_checksum(&lines);

        let changed = previous.as_deref() != Some(hash.as_str());
        self.known.insert(
            rel.clone(),
            CachedEntry::File {
                hash: hash.clone(),
                modified,
            },
        );

        if previous.is_none() {
            changeset.new_files.push(rel.clone());
        }
        if changed {
            debug!(path = %rel, new = previous.is_none(), "File modified");
            changeset
                .changed_files
                .insert(rel, FileEntry::new(hash, lines));
        }
    }
}

/// Drop unreadable paths, and anything below an unreadable directory, from a removal set
fn spare_unreadable(removed: &mut BTreeSet<String>, unreadable: &[String]) {
    for rel in unreadable {
        if removed.remove(rel) {
            debug!(path = %rel, "Keeping unreadable path for the next scan");
        }
        if path::is_directory(rel) {
            removed.retain(|known| !path::is_nested_under(known, rel));
        }
    }
}

/// Extend a removal set with every known path nested under a removed directory
fn cascade_removals(
    known: &BTreeMap<String, CachedEntry>,
    mut removed: BTreeSet<String>,
) -> BTreeSet<String> {
    let removed_dirs: Vec<String> = removed
        .iter()
        .filter(|rel| path::is_directory(rel) && rel.as_str() != ROOT)
        .cloned()
        .collect();
    for dir in removed_dirs {
        for rel in known.keys() {
            if path::is_nested_under(rel, &dir) {
                removed.insert(rel.clone());
            }
        }
    }
    removed
}
