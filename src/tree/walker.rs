//! Ignore-aware filesystem walker
//!
//! Produces wire-path entries for a workspace, parents before children.
//! Ignored directories are not descended into. Files that fail the size or
//! extension filters are reported separately so the caller can warn about them.

use crate::error::ScanError;
use crate::ignore::{IgnoreRules, MARKER_PATH};
use crate::tree::path;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

/// Filesystem entry types
#[derive(Debug, Clone)]
pub enum Entry {
    /// A directory with its wire path
    Directory { rel: String, path: PathBuf },
    /// A file with its wire path and modification time
    File {
        rel: String,
        path: PathBuf,
        modified: SystemTime,
    },
}

impl Entry {
    pub fn rel(&self) -> &str {
        match self {
            Entry::Directory { rel, .. } | Entry::File { rel, .. } => rel,
        }
    }
}

/// Why a file was left out of the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooLarge { size: u64, max: u64 },
    NotText,
}

/// Walker configuration
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Files larger than this are skipped
    pub max_file_size: u64,
    /// Only files whose name ends with one of `text_extensions` are walked
    pub text_only: bool,
    pub text_extensions: Vec<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,
            text_only: true,
            text_extensions: default_text_extensions(),
        }
    }
}

pub fn default_text_extensions() -> Vec<String> {
    [
        ".java",
        ".txt",
        ".gitignore",
        ".xml",
        ".name",
        ".kts",
        ".iml",
        ".bat",
        ".editorconfig",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Result of one walk
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub entries: Vec<Entry>,
    pub skipped: Vec<(String, SkipReason)>,
    pub errors: Vec<ScanError>,
    /// Wire paths that could not be read this pass. A directory here may
    /// be missing any of its children from `entries`.
    pub unreadable: Vec<String>,
}

/// Filesystem walker
pub struct Walker<'a> {
    root: PathBuf,
    rules: &'a IgnoreRules,
    config: &'a WalkerConfig,
}

impl<'a> Walker<'a> {
    pub fn new(root: PathBuf, rules: &'a IgnoreRules, config: &'a WalkerConfig) -> Self {
        Self {
            root,
            rules,
            config,
        }
    }

    /// Walk the workspace
    ///
    /// Per-entry failures are collected in [`WalkOutcome::errors`]; they never
    /// abort the walk.
    pub fn walk(&self) -> WalkOutcome {
        let mut outcome = WalkOutcome::default();

        let mut walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.should_skip(entry));

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if let Some(rel) = self.error_path(&e) {
                        outcome.unreadable.push(rel);
                    }
                    outcome.errors.push(ScanError::Walk(e));
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                continue;
            }
            let is_dir = file_type.is_dir();
            let rel = match path::relative_path(&self.root, entry.path(), is_dir) {
                Ok(rel) => rel,
                Err(e) => {
                    outcome.errors.push(e);
                    if is_dir {
                        walker.skip_current_dir();
                    }
                    continue;
                }
            };

            if is_dir {
                outcome.entries.push(Entry::Directory {
                    rel,
                    path: entry.into_path(),
                });
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            if self.config.text_only && !self.has_text_extension(&rel) {
                outcome.skipped.push((rel, SkipReason::NotText));
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    outcome.unreadable.push(rel);
                    outcome.errors.push(ScanError::Walk(e));
                    continue;
                }
            };
            if metadata.len() > self.config.max_file_size {
                outcome.skipped.push((
                    rel,
                    SkipReason::TooLarge {
                        size: metadata.len(),
                        max: self.config.max_file_size,
                    },
                ));
                continue;
            }
            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(source) => {
                    outcome.unreadable.push(rel.clone());
                    outcome.errors.push(ScanError::Io { path: rel, source });
                    continue;
                }
            };

            outcome.entries.push(Entry::File {
                rel,
                path: entry.into_path(),
                modified,
            });
        }

        outcome
    }

    /// Wire path of the entry a walk error refers to, if it has one
    fn error_path(&self, error: &walkdir::Error) -> Option<String> {
        let failed = error.path()?;
        path::relative_path(&self.root, failed, failed.is_dir()).ok()
    }

    /// Ignored entries and the marker file are pruned before descent.
    /// Names that cannot be represented are left for `walk` to report.
    fn should_skip(&self, entry: &DirEntry) -> bool {
        let is_dir = entry.file_type().is_dir();
        match path::relative_path(&self.root, entry.path(), is_dir) {
            Ok(rel) => rel == MARKER_PATH || self.rules.is_ignored(&rel),
            Err(_) => false,
        }
    }

    fn has_text_extension(&self, rel: &str) -> bool {
        self.config
            .text_extensions
            .iter()
            .any(|extension| rel.ends_with(extension.as_str()))
    }
}

/// Convenience for walking with default rules
pub fn walk_workspace(root: &Path, rules: &IgnoreRules, config: &WalkerConfig) -> WalkOutcome {
    Walker::new(root.to_path_buf(), rules, config).walk()
}
