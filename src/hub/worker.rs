//! Intake worker: the only writer of the canonical tree.
//!
//! Drains the hub-wide intake queue one message at a time. Per session it
//! tracks whether the first message was processed, the replica's private
//! tree, and the replica's latest user-code map. Role comes from the
//! handshake and is never changed here.

use crate::error::{SessionError, TreeError};
use crate::hub::registry::SessionRegistry;
use crate::hub::session::SessionHandle;
use crate::protocol::{self, Payload, UserCodeLimits, UserCodeReport};
use crate::tree::changeset::Changeset;
use crate::tree::repository::Repository;
use crate::types::{Role, SessionId, UserCodeMap};
use crossbeam::channel::Receiver;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One line read from a session
pub struct Intake {
    pub session: Arc<SessionHandle>,
    pub line: String,
}

struct SessionState {
    handle: Arc<SessionHandle>,
    initial_processed: bool,
    replica_tree: Option<Repository>,
    user_code: UserCodeMap,
}

impl SessionState {
    fn new(handle: Arc<SessionHandle>) -> Self {
        Self {
            handle,
            initial_processed: false,
            replica_tree: None,
            user_code: UserCodeMap::new(),
        }
    }

    fn is_ready_replica(&self) -> bool {
        self.handle.role() == Role::Replica && self.initial_processed && self.handle.is_alive()
    }
}

pub struct IntakeWorker {
    registry: Arc<SessionRegistry>,
    limits: UserCodeLimits,
    canonical: Option<Repository>,
    sessions: HashMap<SessionId, SessionState>,
}

impl IntakeWorker {
    pub fn new(registry: Arc<SessionRegistry>, limits: UserCodeLimits) -> Self {
        Self {
            registry,
            limits,
            canonical: None,
            sessions: HashMap::new(),
        }
    }

    /// Process messages until every intake sender is gone
    pub fn run(mut self, intake: Receiver<Intake>) {
        for message in intake.iter() {
            self.process(message);
        }
        debug!("Intake queue closed");
    }

    pub fn canonical(&self) -> Option<&Repository> {
        self.canonical.as_ref()
    }

    /// Handle one message; a failure closes only the sending session
    pub fn process(&mut self, message: Intake) {
        self.sessions.retain(|_, state| state.handle.is_alive());

        let session = message.session;
        if !session.is_alive() {
            return;
        }
        if let Err(e) = self.handle_line(&session, &message.line) {
            match &e {
                SessionError::Consistency(_) => {
                    warn!(session = session.id(), role = %session.role(), error = %e, "Session state diverged")
                }
                _ => warn!(session = session.id(), role = %session.role(), error = %e, "Rejected message"),
            }
            session.close(e.close_reason());
            self.sessions.remove(&session.id());
        }
    }

    fn handle_line(&mut self, session: &Arc<SessionHandle>, line: &str) -> Result<(), SessionError> {
        let initial = !self
            .sessions
            .entry(session.id())
            .or_insert_with(|| SessionState::new(Arc::clone(session)))
            .initial_processed;

        let payload = protocol::decode_inbound(line, session.role(), initial, &self.limits)?;
        match payload {
            Payload::Snapshot(snapshot) if session.role().is_source() => {
                self.replace_canonical(session, &snapshot)?
            }
            Payload::Snapshot(snapshot) => self.register_replica(session, &snapshot)?,
            Payload::Changeset(changeset) => self.apply_source_changeset(session, &changeset)?,
            Payload::UserCodeReport(report) => self.record_user_code(session, report)?,
        }

        if let Some(state) = self.sessions.get_mut(&session.id()) {
            state.initial_processed = true;
        }
        Ok(())
    }

    fn replace_canonical(
        &mut self,
        session: &SessionHandle,
        snapshot: &Changeset,
    ) -> Result<(), SessionError> {
        let tree = Repository::from_snapshot(snapshot, Role::Source)?;
        info!(
            session = session.id(),
            "Received initial tree with {}",
            tree.summary()
        );
        self.canonical = Some(tree);
        self.broadcast_to_replicas();
        Ok(())
    }

    fn apply_source_changeset(
        &mut self,
        session: &SessionHandle,
        changeset: &Changeset,
    ) -> Result<(), SessionError> {
        let canonical = self.canonical.as_mut().ok_or(TreeError::NoCanonicalTree)?;
        canonical.apply_changeset(changeset)?;
        if !changeset.is_empty() {
            debug!(session = session.id(), summary = %changeset.summary(), "Applied source changes");
        }
        self.broadcast_to_replicas();
        Ok(())
    }

    fn register_replica(
        &mut self,
        session: &SessionHandle,
        snapshot: &Changeset,
    ) -> Result<(), SessionError> {
        let mut tree = Repository::from_snapshot(snapshot, Role::Replica)?;
        info!(
            session = session.id(),
            "Replica reported {}",
            tree.summary()
        );
        if let Some(canonical) = &self.canonical {
            sync_replica(session, &mut tree, canonical)?;
        }
        if let Some(state) = self.sessions.get_mut(&session.id()) {
            state.replica_tree = Some(tree);
        }
        Ok(())
    }

    /// Send every ready replica the diff from its tree to the canonical tree
    fn broadcast_to_replicas(&mut self) {
        let Some(canonical) = &self.canonical else {
            return;
        };

        let mut failed = Vec::new();
        for (id, state) in self.sessions.iter_mut() {
            if !state.is_ready_replica() {
                continue;
            }
            let Some(tree) = state.replica_tree.as_mut() else {
                continue;
            };
            if let Err(e) = sync_replica(&state.handle, tree, canonical) {
                failed.push((*id, e));
            }
        }

        for (id, e) in failed {
            if let Some(state) = self.sessions.remove(&id) {
                warn!(session = id, error = %e, "Failed to update replica");
                state.handle.close(e.close_reason());
            }
        }
    }

    fn record_user_code(
        &mut self,
        session: &SessionHandle,
        report: UserCodeReport,
    ) -> Result<(), SessionError> {
        let Some(state) = self.sessions.get_mut(&session.id()) else {
            return Ok(());
        };
        debug!(
            session = session.id(),
            path = %report.path,
            regions = report.regions.len(),
            "Received user code"
        );
        state.user_code.insert(report.path, report.regions);
        let line = protocol::encode_user_code_broadcast(session.id(), &state.user_code)?;

        for source in self.registry.with_role(Role::Source) {
            if let Err(e) = source.send(line.clone()) {
                warn!(session = source.id(), error = %e, "Failed to forward user code");
            }
        }
        Ok(())
    }
}

/// Diff a replica's tree to canonical, apply the diff to it, then send it
///
/// An empty diff is still sent and keeps the replica's connection active.
fn sync_replica(
    session: &SessionHandle,
    tree: &mut Repository,
    canonical: &Repository,
) -> Result<(), SessionError> {
    let diff = tree.diff(canonical);
    tree.apply_changeset(&diff)?;
    let line = protocol::encode_changeset(&diff)?;
    if !diff.is_empty() {
        debug!(session = session.id(), summary = %diff.summary(), "Sending changes to replica");
    }
    session.send(line)
}
