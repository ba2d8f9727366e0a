//! A profile (identified by its x-only pubkey) and its ordered sessions.
//! Deleting a profile cascades to its sessions; this module only models
//! the in-memory shape, the [`crate::traits::ProfileStore`] collaborator
//! owns persistence.

use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub pubkey: String,
    pub sessions: Vec<Session>,
}

impl Profile {
    pub fn new(pubkey: String) -> Self {
        Self {
            pubkey,
            sessions: Vec::new(),
        }
    }

    pub fn session_by_id_mut(&mut self, session_id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.session_id == session_id)
    }

    pub fn session_by_peer_mut(&mut self, theirs: &str) -> Option<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|s| s.theirs.as_deref() == Some(theirs))
    }

    pub fn remove_session(&mut self, session_id: &str) {
        self.sessions.retain(|s| s.session_id != session_id);
    }

    pub fn remove_session_by_peer(&mut self, theirs: &str) {
        self.sessions.retain(|s| s.theirs.as_deref() != Some(theirs));
    }
}
