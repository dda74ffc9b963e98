//! Workspace side of the client: scanning, the mirror tree and write-back.
//!
//! The mirror holds what was last confirmed sent (source) or received
//! (replica). It is rebuilt from a fresh scan on every new connection.

use crate::client::board::{RegionKey, UserCodeBoard};
use crate::client::connection::Connection;
use crate::client::writeback::{WriteBack, WriteOutcome};
use crate::config::ClientConfig;
use crate::error::{SessionError, WorkspaceError};
use crate::ignore;
use crate::protocol;
use crate::scanner::Scanner;
use crate::tree::changeset::Changeset;
use crate::tree::repository::Repository;
use crate::types::Role;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Everything the client loop reacts to
pub enum WorkspaceEvent {
    /// A connection passed the handshake
    Activate {
        generation: u64,
        connection: Connection,
    },
    /// A connection attempt failed or a live connection ended.
    /// `generation` is `None` when the operator asked to stop.
    Deactivate {
        generation: Option<u64>,
        reason: String,
    },
    /// Drop the connection and start over with a fresh scan
    Resync,
    /// One line from the hub
    IncomingLine { generation: u64, line: String },
}

impl std::fmt::Debug for WorkspaceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkspaceEvent::Activate { generation, .. } => {
                write!(f, "Activate {{ generation: {} }}", generation)
            }
            WorkspaceEvent::Deactivate { generation, reason } => write!(
                f,
                "Deactivate {{ generation: {:?}, reason: {:?} }}",
                generation, reason
            ),
            WorkspaceEvent::Resync => write!(f, "Resync"),
            WorkspaceEvent::IncomingLine { generation, line } => write!(
                f,
                "IncomingLine {{ generation: {}, bytes: {} }}",
                generation,
                line.len()
            ),
        }
    }
}

/// A bound workspace and its sync state
pub struct WorkspaceSync {
    role: Role,
    root: PathBuf,
    scanner: Scanner,
    mirror: Repository,
    writeback: WriteBack,
    board: UserCodeBoard,
    /// Set when incoming paths could not be written; the mirror is ahead of disk
    resync_requested: bool,
}

impl WorkspaceSync {
    /// Bind the configured workspace directory to the configured room
    pub fn open(config: &ClientConfig) -> Result<Self, WorkspaceError> {
        let root = dunce::canonicalize(&config.workspace)
            .map_err(|_| WorkspaceError::MissingDirectory(config.workspace.clone()))?;
        let rules = ignore::bind_workspace(&root, &config.room, config.rebind)?;
        let scanner = Scanner::new(root.clone(), rules, config.walker_config());
        let writeback = WriteBack::new(root.clone(), &config.sync_once, config.verify_after_write);

        info!(
            root = %root.display(),
            room = %config.room,
            role = %config.role(),
            "Workspace ready"
        );
        Ok(Self {
            role: config.role(),
            root,
            scanner,
            mirror: Repository::new(),
            writeback,
            board: UserCodeBoard::new(),
            resync_requested: false,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mirror(&self) -> &Repository {
        &self.mirror
    }

    pub fn board(&self) -> &UserCodeBoard {
        &self.board
    }

    /// Forget every cached scan result and the mirror
    pub fn reset(&mut self) {
        self.scanner.clear();
        self.mirror = Repository::new();
        self.board.clear();
        self.resync_requested = false;
    }

    /// Whether a write failed since the last call, clearing the request
    ///
    /// A fresh snapshot on a new connection lets the hub resend whatever
    /// did not make it to disk.
    pub fn take_resync_request(&mut self) -> bool {
        std::mem::take(&mut self.resync_requested)
    }

    /// Full snapshot sent as the first message of a connection
    #[instrument(skip(self), fields(role = %self.role))]
    pub fn initial_message(&mut self) -> Result<String, SessionError> {
        self.reset();
        let snapshot = self.scanner.scan();
        self.mirror = Repository::from_snapshot(&snapshot, self.role)?;
        info!(summary = %self.mirror.summary(), "Sending initial snapshot");
        match self.role {
            Role::Source => protocol::encode_changeset(&snapshot),
            Role::Replica => protocol::encode_replica_snapshot(&snapshot),
        }
    }

    /// Periodic pass: a source rescans and reports, even when nothing changed
    pub fn poll_changes(&mut self) -> Result<Option<String>, SessionError> {
        if !self.role.is_source() {
            return Ok(None);
        }
        let changes = self.scanner.scan();
        self.mirror.apply_changeset(&changes)?;
        if !changes.is_empty() {
            info!(summary = %changes.summary(), "Sending changes");
        }
        protocol::encode_changeset(&changes).map(Some)
    }

    /// Handle one line from the hub; returns the lines to send back
    pub fn handle_line(&mut self, line: &str) -> Result<Vec<String>, SessionError> {
        match self.role {
            Role::Source => {
                let broadcast = protocol::decode_user_code_broadcast(line)?;
                let changed = self.board.record(&broadcast);
                for key in &changed {
                    self.log_region(key);
                }
                Ok(Vec::new())
            }
            Role::Replica => {
                let changeset = protocol::decode_changeset(line)?;
                let outcome = self.apply_incoming(&changeset)?;
                outcome
                    .reports
                    .iter()
                    .map(protocol::encode_user_code_report)
                    .collect()
            }
        }
    }

    fn apply_incoming(&mut self, changeset: &Changeset) -> Result<WriteOutcome, SessionError> {
        if changeset.is_empty() {
            debug!("Hub sent an empty changeset");
            return Ok(WriteOutcome::default());
        }
        self.mirror.apply_changeset(changeset)?;
        let outcome = self.writeback.apply(changeset);
        if !outcome.failed.is_empty() {
            warn!(
                failed = outcome.failed.len(),
                "Some paths could not be written, requesting a resync"
            );
            self.resync_requested = true;
        }
        Ok(outcome)
    }

    fn log_region(&self, key: &RegionKey) {
        let entries = self.board.entries(key);
        info!(region = %key, users = entries.len(), "User code updated");
        for entry in entries {
            debug!(
                region = %key,
                user = entry.user_id,
                received_at = %entry.received_at.to_rfc3339(),
                "{}",
                entry.lines.join("\n")
            );
        }
    }
}
