//! Write a received changeset onto a replica's workspace.
//!
//! Changed files go through the region merge so that user code survives.
//! Every failure is local to one path: it is logged and the rest of the
//! changeset is still applied.

use crate::merge;
use crate::protocol::UserCodeReport;
use crate::tree::changeset::Changeset;
use crate::tree::hasher;
use crate::tree::path::{self, ROOT};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Counters for one applied changeset
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub directories_created: usize,
    pub files_written: usize,
    pub files_removed: usize,
    pub directories_removed: usize,
    /// Paths skipped because of a local error
    pub failed: Vec<String>,
    /// Region bodies of every written file that has regions
    pub reports: Vec<UserCodeReport>,
}

enum FileWrite {
    /// Deliberately left alone
    Skipped,
    /// Written; carries the region report if the file has regions
    Written(Option<UserCodeReport>),
}

pub struct WriteBack {
    root: PathBuf,
    sync_once: HashSet<String>,
    verify: bool,
}

impl WriteBack {
    pub fn new(root: impl Into<PathBuf>, sync_once: &[String], verify: bool) -> Self {
        Self {
            root: root.into(),
            sync_once: sync_once.iter().cloned().collect(),
            verify,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Apply `changeset` to disk
    ///
    /// Order: new directories, changed files, removed files, removed
    /// directories. The changeset's own list order is kept within each step.
    #[instrument(skip(self, changeset), fields(root = %self.root.display(), changes = changeset.len()))]
    pub fn apply(&self, changeset: &Changeset) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();

        for dir in &changeset.new_directories {
            match self.create_directory(dir) {
                Ok(true) => outcome.directories_created += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %dir, error = %e, "Failed to create directory");
                    outcome.failed.push(dir.clone());
                }
            }
        }

        let new_files: HashSet<&str> = changeset.new_files.iter().map(String::as_str).collect();
        for (rel, entry) in &changeset.changed_files {
            let is_new = new_files.contains(rel.as_str());
            let Some(lines) = entry.content.as_ref() else {
                warn!(path = %rel, "Changed file carries no content");
                outcome.failed.push(rel.clone());
                continue;
            };
            match self.write_file(rel, &entry.hash, lines, is_new) {
                Ok(FileWrite::Written(report)) => {
                    outcome.files_written += 1;
                    outcome.reports.extend(report);
                }
                Ok(FileWrite::Skipped) => {}
                Err(e) => {
                    warn!(path = %rel, error = %e, "Failed to write file");
                    outcome.failed.push(rel.clone());
                }
            }
        }

        for rel in &changeset.removed_files {
            match self.remove(rel, false) {
                Ok(true) => outcome.files_removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %rel, error = %e, "Failed to delete file");
                    outcome.failed.push(rel.clone());
                }
            }
        }
        for rel in &changeset.removed_directories {
            match self.remove(rel, true) {
                Ok(true) => outcome.directories_removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %rel, error = %e, "Failed to delete directory");
                    outcome.failed.push(rel.clone());
                }
            }
        }

        info!(
            created = outcome.directories_created,
            written = outcome.files_written,
            removed = outcome.files_removed + outcome.directories_removed,
            failed = outcome.failed.len(),
            "Applied changeset to workspace"
        );
        outcome
    }

    fn target(&self, rel: &str) -> io::Result<PathBuf> {
        path::resolve(&self.root, rel).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' does not name a path inside the workspace", rel),
            )
        })
    }

    /// Returns whether a directory was created
    fn create_directory(&self, rel: &str) -> io::Result<bool> {
        if rel == ROOT {
            return Ok(false);
        }
        let target = self.target(rel)?;
        if target.is_dir() {
            warn!(path = %rel, "Directory was already there. Created by user?");
            return Ok(false);
        }
        fs::create_dir(&target)?;
        debug!(path = %rel, "Created directory");
        Ok(true)
    }

    fn write_file(
        &self,
        rel: &str,
        hash: &str,
        lines: &[String],
        is_new: bool,
    ) -> io::Result<FileWrite> {
        let target = self.target(rel)?;
        let exists = target.is_file();
        if !is_new && self.sync_once.contains(rel) && exists {
            debug!(path = %rel, "Leaving sync-once file untouched");
            return Ok(FileWrite::Skipped);
        }
        if is_new && exists {
            warn!(path = %rel, "File was already there. Created by user?");
        } else if !is_new && !exists {
            info!(path = %rel, "Changed file was not on disk, creating it");
        }

        let merged = merge::merge_into_file(&target, lines)?;

        if self.verify {
            let written = hasher::read_lines(&target)?;
            let written_hash = hasher::compute_lines_checksum(&written);
            if written_hash != hash {
                warn!(
                    path = %rel,
                    expected = %hash,
                    actual = %written_hash,
                    regions = merged.regions.len(),
                    "Written file differs from the announced hash"
                );
            }
        }

        if merged.regions.is_empty() {
            return Ok(FileWrite::Written(None));
        }
        let regions: BTreeMap<String, Vec<String>> = merged
            .regions
            .into_iter()
            .enumerate()
            .map(|(ordinal, body)| (ordinal.to_string(), body))
            .collect();
        Ok(FileWrite::Written(Some(UserCodeReport {
            path: rel.to_string(),
            regions,
        })))
    }

    /// Returns whether something was removed
    fn remove(&self, rel: &str, directory: bool) -> io::Result<bool> {
        if rel == ROOT {
            warn!("Refusing to remove the workspace root");
            return Ok(false);
        }
        let target = self.target(rel)?;
        let result = if directory {
            fs::remove_dir(&target)
        } else {
            fs::remove_file(&target)
        };
        match result {
            Ok(()) => {
                debug!(path = %rel, "Deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %rel, "Did not exist. Already deleted by user?");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
