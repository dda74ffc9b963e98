//! Error types for the roomsync replication engine.

use std::path::PathBuf;
use thiserror::Error;

/// Tree model consistency errors
///
/// Raised when a changeset or snapshot does not fit the tree it is applied to.
/// These indicate sender/receiver divergence and always end the owning session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Directory already there: {0}")]
    DirectoryExists(String),

    #[error("Directory was not there: {0}")]
    DirectoryMissing(String),

    #[error("Removed file was not registered: {0}")]
    FileMissing(String),

    #[error("New file '{0}' was not in changed files")]
    NewFileNotChanged(String),

    #[error("Changed file '{0}' was not new or currently registered")]
    ChangedFileUntracked(String),

    #[error("'{path}' needed '{parent}', but it was not found")]
    ParentMissing { path: String, parent: String },

    #[error("'{0}' is tracked both as a file and as a directory")]
    PathCollision(String),

    #[error("New files and changed files have to be the same set in a snapshot")]
    SnapshotMismatch,

    #[error("Cannot remove files or directories in a snapshot")]
    RemovalInSnapshot,

    #[error("Replica sessions cannot remove paths ({0})")]
    ForbiddenRemoval(String),

    #[error("There was no initial tree")]
    NoCanonicalTree,
}

/// Wire protocol and schema errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("Maliciously formed path in '{field}': '{path}'")]
    InvalidPath { field: &'static str, path: String },

    #[error("Changed file '{0}' is missing its lines")]
    MissingLines(String),

    #[error("Hash of '{path}' does not match its lines")]
    HashMismatch { path: String },

    #[error("Line too large: {0} bytes (max: {1})")]
    LineTooLarge(usize, usize),

    #[error("User code report for '{path}' exceeds limits: {reason}")]
    UserCodeLimit { path: String, reason: String },

    #[error("Invalid answer from hub: {0}")]
    UnexpectedAnswer(String),
}

/// Per-entry scanner errors
///
/// Never abort a scan: the offending entry is logged and retried next pass.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file name '{name}' below '{parent}'")]
    InvalidFileName { parent: String, name: String },

    #[error("Path '{0}' is not representable on the wire")]
    UnsupportedPath(String),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Workspace binding errors (marker file handling)
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Invalid workspace directory: {0}")]
    MissingDirectory(PathBuf),

    #[error("The directory '{0}' is not empty or a valid project")]
    NotBound(PathBuf),

    #[error("Workspace is bound to room '{bound}', not '{requested}'")]
    RoomMismatch { bound: String, requested: String },

    #[error("Project marker {0} is empty")]
    EmptyMarker(PathBuf),

    #[error("Workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session-level errors
///
/// Every variant tears down exactly one session; none of them reach the hub itself.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Peer disconnected")]
    Disconnected,

    #[error("Incorrect room")]
    Rejected,

    #[error("Outbound queue offer timed out")]
    QueueTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Consistency error: {0}")]
    Consistency(#[from] TreeError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
}

impl SessionError {
    /// Short reason used in teardown log lines
    pub fn close_reason(&self) -> &'static str {
        match self {
            SessionError::Io(_) => "Error",
            SessionError::Disconnected => "Null line",
            SessionError::Rejected => "Denied",
            SessionError::QueueTimeout => "Timeout",
            SessionError::Protocol(_) => "Malformed",
            SessionError::Consistency(_) => "Inconsistent",
            SessionError::Workspace(_) => "Workspace",
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Protocol(ProtocolError::Malformed(err))
    }
}

/// Configuration and startup errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration validation failed:\n{0}")]
    Invalid(String),

    #[error("Logging configuration error: {0}")]
    Logging(String),
}
