//! A single peer-symmetric session between our pubkey and a (possibly not
//! yet known) peer pubkey, and its lifecycle states.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    AwaitingScan,
    QRScanned,
    ResponseSent,
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub ours: String,
    pub theirs: Option<String>,
    pub secret: String,
    pub relays: Vec<String>,
    pub permissions: Vec<String>,
    pub status: SessionStatus,
    pub created_at: i64,
}

impl Session {
    pub fn new_awaiting_scan(
        session_id: String,
        ours: String,
        secret: String,
        relays: Vec<String>,
        permissions: Vec<String>,
        created_at: i64,
    ) -> Self {
        Self {
            session_id,
            ours,
            theirs: None,
            secret,
            relays,
            permissions,
            status: SessionStatus::AwaitingScan,
            created_at,
        }
    }

    pub fn new_connected(
        session_id: String,
        ours: String,
        theirs: String,
        secret: String,
        relays: Vec<String>,
        permissions: Vec<String>,
        created_at: i64,
    ) -> Self {
        Self {
            session_id,
            ours,
            theirs: Some(theirs),
            secret,
            relays,
            permissions,
            status: SessionStatus::Connected,
            created_at,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awaiting_scan_session_has_no_peer_yet() {
        let session = Session::new_awaiting_scan(
            "sess-1".into(),
            "a".repeat(64),
            "s1".into(),
            vec!["wss://relay".into()],
            vec![],
            1_700_000_000,
        );
        assert_eq!(session.status, SessionStatus::AwaitingScan);
        assert!(session.theirs.is_none());
        assert!(!session.is_connected());
    }

    #[test]
    fn connected_session_carries_peer_pubkey() {
        let session = Session::new_connected(
            "sess-2".into(),
            "a".repeat(64),
            "b".repeat(64),
            "s1".into(),
            vec!["wss://relay".into()],
            vec![],
            1_700_000_000,
        );
        assert!(session.is_connected());
        assert_eq!(session.theirs.as_deref(), Some("b".repeat(64).as_str()));
    }
}
