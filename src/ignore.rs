//! Workspace marker file and ignore rules.
//!
//! Every bound workspace carries a marker file `.roomsync` at its root. The
//! first line is the room the workspace is bound to; every following line is
//! an ignore rule. A rule starting with `r` is a regular expression matched
//! against the whole wire path (e.g. `r.*?~$`); any other rule is a literal
//! wire path (`/Project/build/`). Directory rules carry the trailing `/`.
//!
//! Binding a workspace to a room:
//! - an empty directory gets a fresh marker with the default ignore lines,
//! - a directory whose marker names the same room keeps its rules,
//! - anything else is rejected unless a rebind is requested.

use crate::error::WorkspaceError;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Marker file name at the workspace root
pub const MARKER_FILE_NAME: &str = ".roomsync";

/// Wire path of the marker file (always skipped by the scanner)
pub const MARKER_PATH: &str = "/.roomsync";

/// Prefix that turns an ignore line into a regular expression
pub const REGEX_RULE_PREFIX: &str = "r";

/// Ignore lines written into a freshly bound marker
pub const DEFAULT_IGNORE_LINES: &[&str] = &[
    "/Project/build/",
    "/Project/gradle/",
    "/Project/.gradle/",
    "/Project/gradlew.bat",
    "/Project/gradlew",
    r"r.*?\/\.goutputstream-.*?$",
    r"r.*?~$",
];

/// Ordered literal and regex ignore rules
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    literals: Vec<String>,
    patterns: Vec<Regex>,
}

impl IgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rules from marker lines (the room line already removed)
    ///
    /// Blank lines are skipped; a regex that fails to compile is logged and dropped.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Self::new();
        for line in lines {
            rules.add_rule(line.as_ref());
        }
        rules
    }

    pub fn defaults() -> Self {
        Self::from_lines(DEFAULT_IGNORE_LINES.iter())
    }

    pub fn add_rule(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match line.strip_prefix(REGEX_RULE_PREFIX) {
            Some(pattern) => match Regex::new(&format!("^(?:{})$", pattern)) {
                Ok(regex) => self.patterns.push(regex),
                Err(e) => warn!(rule = %line, error = %e, "Ignoring invalid ignore regex"),
            },
            None => self.literals.push(line.to_string()),
        }
    }

    /// Whether a wire path is ignored (directories with their trailing `/`)
    pub fn is_ignored(&self, path: &str) -> bool {
        self.literals.iter().any(|literal| literal == path)
            || self.patterns.iter().any(|regex| regex.is_match(path))
    }

    pub fn len(&self) -> usize {
        self.literals.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Path to the marker file of a workspace
pub fn marker_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(MARKER_FILE_NAME)
}

/// Bind a workspace directory to a room and load its ignore rules
pub fn bind_workspace(
    workspace_root: &Path,
    room: &str,
    rebind: bool,
) -> Result<IgnoreRules, WorkspaceError> {
    if !workspace_root.is_dir() {
        return Err(WorkspaceError::MissingDirectory(workspace_root.to_path_buf()));
    }

    let marker = marker_path(workspace_root);
    if marker.is_file() {
        let contents = fs::read_to_string(&marker)?;
        let mut lines = contents.lines();
        let bound = match lines.next() {
            Some(first) if !first.trim().is_empty() => first.trim().to_string(),
            _ if rebind => return write_marker(&marker, room),
            _ => return Err(WorkspaceError::EmptyMarker(marker)),
        };
        if bound == room {
            let rules = IgnoreRules::from_lines(lines);
            info!(room = %room, rules = rules.len(), "Loaded workspace marker");
            return Ok(rules);
        }
        if rebind {
            warn!(from = %bound, to = %room, "Rebinding workspace to another room");
            return write_marker(&marker, room);
        }
        return Err(WorkspaceError::RoomMismatch {
            bound,
            requested: room.to_string(),
        });
    }

    let is_empty = fs::read_dir(workspace_root)?.next().is_none();
    if is_empty || rebind {
        return write_marker(&marker, room);
    }
    Err(WorkspaceError::NotBound(workspace_root.to_path_buf()))
}

fn write_marker(marker: &Path, room: &str) -> Result<IgnoreRules, WorkspaceError> {
    let mut file = fs::File::create(marker)?;
    writeln!(file, "{}", room)?;
    for line in DEFAULT_IGNORE_LINES {
        writeln!(file, "{}", line)?;
    }
    info!(room = %room, marker = %marker.display(), "Bound workspace to room");
    Ok(IgnoreRules::defaults())
}
