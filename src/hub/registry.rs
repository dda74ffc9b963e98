//! Connected-session registry
//!
//! The one lock of the hub. It is held only to mutate or copy the list.

use crate::hub::session::SessionHandle;
use crate::types::{Role, SessionId};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<Vec<Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session; returns the number of connected sessions
    pub fn add(&self, session: Arc<SessionHandle>) -> usize {
        let mut sessions = self.sessions.lock();
        sessions.push(session);
        sessions.len()
    }

    /// Unregister a session; returns the number of connected sessions left
    pub fn remove(&self, id: SessionId) -> usize {
        let mut sessions = self.sessions.lock();
        sessions.retain(|session| session.id() != id);
        sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current session list
    pub fn snapshot(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.lock().clone()
    }

    /// Connected sessions with the given role
    pub fn with_role(&self, role: Role) -> Vec<Arc<SessionHandle>> {
        self.sessions
            .lock()
            .iter()
            .filter(|session| session.role() == role)
            .cloned()
            .collect()
    }
}
