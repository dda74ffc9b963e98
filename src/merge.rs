//! Sentinel-delimited region merge
//!
//! A region starts at a line like `// <USER CODE> label` and ends at a line
//! like `// </USER CODE>`. Merging takes everything outside the regions from
//! the incoming (canonical) text and everything inside the regions from the
//! current (local) text, matching regions by ordinal.
//!
//! When the two texts disagree on the number of regions the incoming text
//! wins unchanged and the local region bodies are reported as empty.

use crate::tree::hasher;
use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

fn start_marker() -> &'static Regex {
    static START: OnceLock<Regex> = OnceLock::new();
    START.get_or_init(|| Regex::new(r"^[ \t]*// *<USER CODE>[ \t]*(.*?)$").unwrap())
}

fn end_marker() -> &'static Regex {
    static END: OnceLock<Regex> = OnceLock::new();
    END.get_or_init(|| Regex::new(r"^[ \t]*// *</USER CODE>[ \t]*(.*?)$").unwrap())
}

/// Line indices of one region's start and end markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    /// Text after the start marker, if any
    pub label: String,
}

impl Region {
    /// Lines strictly between the markers
    pub fn body<'a, S>(&self, lines: &'a [S]) -> &'a [S] {
        &lines[self.start + 1..self.end]
    }
}

/// Locate the regions of a text, top to bottom
///
/// A start marker only opens a region when none is open; an end marker
/// without an open region is logged and ignored. A region left open at the
/// end of the text is dropped.
pub fn find_regions<S: AsRef<str>>(lines: &[S]) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut open: Option<(usize, String)> = None;

    for (index, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if open.is_none() {
            if let Some(captures) = start_marker().captures(line) {
                let label = captures
                    .get(1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                open = Some((index, label));
                continue;
            }
        }
        if end_marker().is_match(line) {
            match open.take() {
                Some((start, label)) => regions.push(Region {
                    start,
                    end: index,
                    label,
                }),
                None => warn!(line = index + 1, "End of user code without a start marker"),
            }
        }
    }

    if let Some((start, label)) = open {
        warn!(line = start + 1, label = %label, "User code region is never closed");
    }
    regions
}

/// Result of merging two texts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub lines: Vec<String>,
    /// Interior lines of each region taken from the current text, by ordinal
    pub regions: Vec<Vec<String>>,
    /// Region counts differed and the incoming text was taken unchanged
    pub structure_mismatch: bool,
}

impl MergeOutcome {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Each region body joined with `\n`
    pub fn region_bodies(&self) -> Vec<String> {
        self.regions.iter().map(|body| body.join("\n")).collect()
    }
}

/// Merge line sequences: structure from `incoming`, region bodies from `current`
pub fn merge_lines<S: AsRef<str>, T: AsRef<str>>(current: &[S], incoming: &[T]) -> MergeOutcome {
    let current_regions = find_regions(current);
    let incoming_regions = find_regions(incoming);
    let incoming_owned = || incoming.iter().map(|l| l.as_ref().to_string()).collect();

    if current_regions.len() != incoming_regions.len() {
        return MergeOutcome {
            lines: incoming_owned(),
            regions: vec![Vec::new(); incoming_regions.len()],
            structure_mismatch: true,
        };
    }

    let mut lines = Vec::with_capacity(incoming.len());
    let mut regions = Vec::with_capacity(incoming_regions.len());
    let mut next = 0;
    for (incoming_region, current_region) in incoming_regions.iter().zip(&current_regions) {
        lines.extend(
            incoming[next..=incoming_region.start]
                .iter()
                .map(|l| l.as_ref().to_string()),
        );
        let body: Vec<String> = current_region
            .body(current)
            .iter()
            .map(|l| l.as_ref().to_string())
            .collect();
        lines.extend(body.iter().cloned());
        regions.push(body);
        next = incoming_region.end;
    }
    lines.extend(incoming[next..].iter().map(|l| l.as_ref().to_string()));

    MergeOutcome {
        lines,
        regions,
        structure_mismatch: false,
    }
}

/// Merge two texts split on `\n`
pub fn merge_texts(current: &str, incoming: &str) -> MergeOutcome {
    let current: Vec<&str> = current.split('\n').collect();
    let incoming: Vec<&str> = incoming.split('\n').collect();
    merge_lines(&current, &incoming)
}

/// Merge incoming lines into a file on disk and write the result back
///
/// A missing file is created empty first, so a fresh file simply receives
/// the incoming text.
pub fn merge_into_file(path: &Path, incoming: &[String]) -> io::Result<MergeOutcome> {
    if !path.exists() {
        fs::File::create(path)?;
    }
    let current = hasher::read_lines(path)?;
    let outcome = merge_lines(&current, incoming);
    if outcome.structure_mismatch {
        warn!(
            path = %path.display(),
            local = find_regions(&current).len(),
            incoming = outcome.regions.len(),
            "User code regions do not line up, local edits were replaced"
        );
    }
    fs::write(path, hasher::render_lines(&outcome.lines))?;
    Ok(outcome)
}
