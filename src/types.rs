//! Core type definitions shared by the hub and the client.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Session identifier assigned by the hub in accept order (starting at 1).
pub type SessionId = u64;

/// Locally-authored region bodies of one replica: `path -> ordinal -> lines`.
pub type UserCodeMap = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Role of a connection within a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Owner of the canonical tree; the only role allowed to delete paths
    Source,
    /// Read-only mirror that may carry protected user-code regions
    Replica,
}

impl Role {
    pub fn is_source(self) -> bool {
        matches!(self, Role::Source)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => write!(f, "source"),
            Role::Replica => write!(f, "replica"),
        }
    }
}
