//! User-code board: what each replica has written into each region.
//!
//! Kept on the source side, fed by user-code broadcasts from the hub.
//! Presentation-free; the binary logs changes and callers query it.

use crate::protocol::UserCodeBroadcast;
use crate::types::SessionId;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Bodies with more rows than this are summarised
pub const MAX_ROWS: usize = 20;

/// Bodies with a line wider than this are summarised
pub const MAX_WIDTH: usize = 100;

/// One replica's code for one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardEntry {
    pub user_id: SessionId,
    /// Display lines, already summarised and dedented
    pub lines: Vec<String>,
    pub received_at: DateTime<Utc>,
}

/// `path:ordinal`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionKey {
    pub path: String,
    pub ordinal: String,
}

impl RegionKey {
    pub fn new(path: impl Into<String>, ordinal: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ordinal: ordinal.into(),
        }
    }
}

impl std::fmt::Display for RegionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path, self.ordinal)
    }
}

#[derive(Debug, Default)]
pub struct UserCodeBoard {
    regions: BTreeMap<RegionKey, BTreeMap<SessionId, BoardEntry>>,
}

impl UserCodeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything known about the broadcasting replica
    ///
    /// Returns the regions whose displayed content changed.
    pub fn record(&mut self, broadcast: &UserCodeBroadcast) -> Vec<RegionKey> {
        let now = Utc::now();
        let mut incoming: BTreeMap<RegionKey, Vec<String>> = BTreeMap::new();
        for (path, regions) in &broadcast.files {
            for (ordinal, body) in regions {
                if let Some(lines) = display_lines(body) {
                    incoming.insert(RegionKey::new(path.clone(), ordinal.clone()), lines);
                }
            }
        }

        let mut changed = Vec::new();
        for (key, users) in self.regions.iter_mut() {
            if !incoming.contains_key(key) && users.remove(&broadcast.user_id).is_some() {
                changed.push(key.clone());
            }
        }
        self.regions.retain(|_, users| !users.is_empty());

        for (key, lines) in incoming {
            let users = self.regions.entry(key.clone()).or_default();
            let unchanged = users
                .get(&broadcast.user_id)
                .map(|entry| entry.lines == lines)
                .unwrap_or(false);
            if unchanged {
                continue;
            }
            users.insert(
                broadcast.user_id,
                BoardEntry {
                    user_id: broadcast.user_id,
                    lines,
                    received_at: now,
                },
            );
            changed.push(key);
        }
        changed.sort();
        changed.dedup();
        changed
    }

    /// Entries for one region, ordered by user id
    pub fn entries(&self, key: &RegionKey) -> Vec<&BoardEntry> {
        self.regions
            .get(key)
            .map(|users| users.values().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }
}

/// Lines shown for a region body, or `None` for a blank body
pub fn display_lines(body: &[String]) -> Option<Vec<String>> {
    if body.iter().all(|line| line.trim().is_empty()) {
        return None;
    }
    if body.len() > MAX_ROWS {
        return Some(vec![format!("TOO LONG! ({}) rows.", body.len())]);
    }
    if let Some(wide) = body.iter().find(|line| line.chars().count() > MAX_WIDTH) {
        return Some(vec![format!("TOO WIDE! ({}) chars.", wide.chars().count())]);
    }

    let expanded: Vec<String> = body.iter().map(|line| line.replace('\t', "    ")).collect();
    let indent = expanded
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);
    Some(
        expanded
            .iter()
            .map(|line| line.chars().skip(indent).collect())
            .collect(),
    )
}
