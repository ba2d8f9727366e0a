//! The session engine (C7), relay façade (C8), and identity façade (C9),
//! wired together. `IdentityFacade` is the entry point an application
//! embeds: it owns the active profile's pending requests, dispatches
//! inbound events, and drives outbound requests/responses through
//! NIP-44 sealing and Schnorr signing.

use std::sync::Arc;

use rand::RngCore;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use signer_crypto::{nip04, nip44, schnorr, CryptoError, PrivateKey, SecureRng};
use signer_proto::{
    command::Command,
    envelope::{self, RequestFrame, ResponseFrame},
    event,
    uri::ConnectionUri,
    Event, ProtoError, Tag, NOSTR_CONNECT_KIND,
};

use crate::config::EngineConfig;
use crate::error::SessionError;
use crate::pending::{PendingRequest, PendingRequestTable};
use crate::profile::Profile;
use crate::session::{Session, SessionStatus};
use crate::traits::{ProfileStore, RelayTransport, SecureKeyStore};

#[derive(Debug, Clone)]
pub enum EngineNotification {
    SessionStateChanged(Session),
    PingReceived { session_id: String },
}

pub struct IdentityFacade {
    profile_store: Arc<dyn ProfileStore>,
    key_store: Arc<dyn SecureKeyStore>,
    transport: Arc<dyn RelayTransport>,
    pending: PendingRequestTable,
    config: EngineConfig,
    notify: mpsc::UnboundedSender<EngineNotification>,
}

impl IdentityFacade {
    pub fn new(
        profile_store: Arc<dyn ProfileStore>,
        key_store: Arc<dyn SecureKeyStore>,
        transport: Arc<dyn RelayTransport>,
        config: EngineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<EngineNotification>) {
        let (notify, rx) = mpsc::unbounded_channel();
        (
            Self {
                profile_store,
                key_store,
                transport,
                pending: PendingRequestTable::new(),
                config,
                notify,
            },
            rx,
        )
    }

    /// Generate or import a keypair, install it as a fresh profile, and
    /// return its x-only pubkey (hex).
    pub async fn create_profile(&self, private_key_hex: Option<String>) -> Result<String, SessionError> {
        let key = match private_key_hex {
            Some(hex_d) => PrivateKey::from_hex(&hex_d)?,
            None => {
                let mut rng = self.config.rng.lock().unwrap();
                PrivateKey::generate_with_rng(&mut *rng)
            }
        };
        let pubkey = key.xonly_pubkey_hex();
        self.key_store.store_key(&pubkey, key.to_bytes()).await?;
        self.profile_store.upsert_profile(Profile::new(pubkey.clone())).await?;
        tracing::info!(pubkey = %pubkey, "profile created");
        Ok(pubkey)
    }

    /// Allocate a session in `AwaitingScan`, register its secret as a
    /// pending `connect`, and build the bootstrap URI.
    pub async fn open_session(
        &self,
        ours: &str,
        relays: Vec<String>,
        perms: Vec<String>,
    ) -> Result<(Session, String), SessionError> {
        let secret = {
            let mut rng = self.config.rng.lock().unwrap();
            random_secret(&mut *rng)
        };
        let session_id = Uuid::new_v4().to_string();
        let created_at = self.config.clock.now();

        let session = Session::new_awaiting_scan(
            session_id.clone(),
            ours.to_string(),
            secret.clone(),
            relays.clone(),
            perms.clone(),
            created_at,
        );

        self.pending
            .insert(
                secret.clone(),
                PendingRequest {
                    session_id: session_id.clone(),
                    command: Command::Connect,
                    target_pubkey: String::new(),
                    created_at,
                    parameters: vec![],
                },
            )
            .await;

        let mut profile = self.load_or_create_profile(ours).await?;
        profile.sessions.push(session.clone());
        self.profile_store.upsert_profile(profile).await?;

        self.transport.listen(ours, &relays).await?;

        let uri = ConnectionUri {
            pubkey: ours.to_string(),
            relays,
            secret,
            perms,
            name: None,
            url: None,
            image: None,
        }
        .build()?;

        log_state_change(&session);
        let _ = self.notify.send(EngineNotification::SessionStateChanged(session.clone()));
        Ok((session, uri))
    }

    /// Acceptor-side: accept a scanned bootstrap URI, start listening, and
    /// send the connect response echoing `secret`.
    pub async fn on_scan(
        &self,
        ours: &str,
        peer_pubkey: &str,
        relays: Vec<String>,
        secret: String,
        perms: Vec<String>,
    ) -> Result<Session, SessionError> {
        self.transport.listen(ours, &relays).await?;
        let created_at = self.config.clock.now();
        let session = Session::new_connected(
            Uuid::new_v4().to_string(),
            ours.to_string(),
            peer_pubkey.to_string(),
            secret.clone(),
            relays,
            perms,
            created_at,
        );

        let mut profile = self.load_or_create_profile(ours).await?;
        profile.sessions.push(session.clone());
        self.profile_store.upsert_profile(profile).await?;

        let response = ResponseFrame::ok(secret.clone(), secret);
        let content = envelope::encode_response(&response);
        let key = self.load_private_key(ours).await?;
        let event = self.build_outbound_event(ours, peer_pubkey, &content, created_at, &key)?;
        self.transport.publish(&event).await?;

        log_state_change(&session);
        let _ = self.notify.send(EngineNotification::SessionStateChanged(session.clone()));
        Ok(session)
    }

    pub async fn send_ping(&self, ours: &str, session_id: &str) -> Result<(), SessionError> {
        self.send_empty_params_request(ours, session_id, Command::Ping).await
    }

    pub async fn send_disconnect(&self, ours: &str, session_id: &str) -> Result<(), SessionError> {
        self.send_empty_params_request(ours, session_id, Command::Disconnect).await
    }

    async fn send_empty_params_request(
        &self,
        ours: &str,
        session_id: &str,
        command: Command,
    ) -> Result<(), SessionError> {
        let mut profile = self
            .profile_store
            .get_profile_by_pubkey(ours)
            .await?
            .ok_or_else(|| SessionError::ProfileNotFound(ours.to_string()))?;
        let theirs = profile
            .session_by_id_mut(session_id)
            .and_then(|s| s.theirs.clone())
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let created_at = self.config.clock.now();
        self.pending
            .insert(
                id.clone(),
                PendingRequest {
                    session_id: session_id.to_string(),
                    command,
                    target_pubkey: theirs.clone(),
                    created_at,
                    parameters: vec![],
                },
            )
            .await;

        let request = RequestFrame { id, method: command, params: vec![] };
        let content = envelope::encode_request(&request);
        let key = self.load_private_key(ours).await?;
        let event = self.build_outbound_event(ours, &theirs, &content, created_at, &key)?;
        tracing::trace!(pubkey = ours, peer = %theirs, method = ?command, "dispatching outbound request");
        self.transport.publish(&event).await
    }

    /// Look up a session for introspection (tests and higher layers that
    /// want to observe the post-dispatch state).
    pub async fn get_session(&self, ours: &str, session_id: &str) -> Result<Option<Session>, SessionError> {
        let profile = self.profile_store.get_profile_by_pubkey(ours).await?;
        Ok(profile.and_then(|mut p| p.session_by_id_mut(session_id).map(|s| s.clone())))
    }

    /// Pull and process exactly one inbound event for `ours`, if any
    /// arrives before the configured subscription timeout. Returns whether
    /// an event was received (processed or dropped).
    pub async fn run_dispatch_once(&self, ours: &str) -> Result<bool, SessionError> {
        match self.transport.recv(ours, self.config.subscription_timeout).await? {
            Some(event) => {
                self.dispatch_inbound(ours, event).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Process one inbound event. Decrypt/parse/verification failures are
    /// logged and swallowed per the failure semantics in §7 — an
    /// adversarial or malformed event must never propagate as an error.
    pub async fn dispatch_inbound(&self, ours: &str, event: Event) {
        if let Err(err) = self.try_dispatch_inbound(ours, event).await {
            tracing::debug!(pubkey = ours, error = %err, "dropping unprocessable inbound event");
        }
    }

    async fn try_dispatch_inbound(&self, ours: &str, event: Event) -> Result<(), SessionError> {
        verify_inbound_event(&event)?;

        let key = self.load_private_key(ours).await?;
        let peer_bytes = decode_pubkey(&event.pubkey)?;
        let shared = key.ecdh(&peer_bytes)?;
        let plaintext = nip44::decrypt(&shared, &event.content)?;

        if envelope::is_request(&plaintext)? {
            self.handle_request_payload(ours, &event.pubkey, &key, &plaintext).await
        } else {
            let response = envelope::decode_response(&plaintext)?;
            self.handle_response(ours, &event.pubkey, response).await
        }
    }

    /// Decode a request payload, replying with a protocol-level error for
    /// an unknown method instead of dropping the event outright (§4.7).
    async fn handle_request_payload(
        &self,
        ours: &str,
        theirs_hex: &str,
        key: &PrivateKey,
        plaintext: &str,
    ) -> Result<(), SessionError> {
        let request = match envelope::decode_request(plaintext) {
            Ok(request) => request,
            Err(ProtoError::UnknownCommand(method)) => {
                let id = request_id_of(plaintext).unwrap_or_default();
                let response = ResponseFrame::error(id, SessionError::UnknownMethod(method).to_string());
                let created_at = self.config.clock.now();
                let content = envelope::encode_response(&response);
                let event = self.build_outbound_event(ours, theirs_hex, &content, created_at, key)?;
                return self.transport.publish(&event).await;
            }
            Err(other) => return Err(other.into()),
        };
        self.handle_request(ours, theirs_hex, key, request).await
    }

    async fn handle_request(
        &self,
        ours: &str,
        theirs_hex: &str,
        key: &PrivateKey,
        request: RequestFrame,
    ) -> Result<(), SessionError> {
        tracing::trace!(pubkey = ours, peer = theirs_hex, method = ?request.method, id = %request.id, "dispatching inbound request");
        let mut profile = self
            .profile_store
            .get_profile_by_pubkey(ours)
            .await?
            .ok_or_else(|| SessionError::ProfileNotFound(ours.to_string()))?;

        if request.method != Command::Connect && profile.session_by_peer_mut(theirs_hex).is_none() {
            return Ok(()); // no session for this peer; drop silently
        }

        let created_at = self.config.clock.now();
        let mut session_snapshot = None;

        let response = match request.method {
            Command::Connect => match profile.session_by_peer_mut(theirs_hex) {
                Some(session) => {
                    session.status = SessionStatus::Connected;
                    session_snapshot = Some(session.clone());
                    ResponseFrame::ok(request.id.clone(), "ack")
                }
                None => return Ok(()),
            },
            Command::Ping => ResponseFrame::ok(request.id.clone(), "pong"),
            Command::Disconnect => {
                profile.remove_session_by_peer(theirs_hex);
                ResponseFrame::ok(request.id.clone(), "ack")
            }
            Command::SignEvent => match self.handle_sign_event(ours, key, &request) {
                Ok(signed_json) => ResponseFrame::ok(request.id.clone(), signed_json),
                Err(err) => ResponseFrame::error(request.id.clone(), err.to_string()),
            },
            Command::GetPublicKey => ResponseFrame::ok(request.id.clone(), ours.to_string()),
            Command::Nip04Encrypt | Command::Nip04Decrypt | Command::Nip44Encrypt | Command::Nip44Decrypt => {
                match handle_cipher_command(key, request.method, &request.params) {
                    Ok(result) => ResponseFrame::ok(request.id.clone(), result),
                    Err(err) => ResponseFrame::error(request.id.clone(), err.to_string()),
                }
            }
        };

        self.profile_store.upsert_profile(profile).await?;
        if let Some(session) = session_snapshot {
            log_state_change(&session);
            let _ = self.notify.send(EngineNotification::SessionStateChanged(session));
        }

        let content = envelope::encode_response(&response);
        let event = self.build_outbound_event(ours, theirs_hex, &content, created_at, key)?;
        self.transport.publish(&event).await
    }

    fn handle_sign_event(&self, ours: &str, key: &PrivateKey, request: &RequestFrame) -> Result<String, SessionError> {
        let raw = request
            .params
            .first()
            .ok_or_else(|| ProtoError::MalformedFrame("sign_event requires params[0]".into()))?;
        let unsigned: UnsignedEvent = serde_json::from_str(raw).map_err(ProtoError::from)?;
        let created_at = unsigned.created_at.unwrap_or_else(|| self.config.clock.now());
        let mut rng = self.config.rng.lock().unwrap();
        let signed = event::sign_event(ours, created_at, unsigned.kind, unsigned.tags, unsigned.content, |digest| {
            key.sign_schnorr_with_rng(digest, &mut *rng)
        });
        drop(rng);
        serde_json::to_string(&signed).map_err(|e| ProtoError::from(e).into())
    }

    async fn handle_response(&self, ours: &str, sender_hex: &str, response: ResponseFrame) -> Result<(), SessionError> {
        tracing::trace!(pubkey = ours, peer = sender_hex, id = %response.id, "dispatching inbound response");
        let pending = match self.pending.remove(&response.id).await {
            Some(pending) => pending,
            None => return Err(SessionError::RequestNotPending(response.id)),
        };

        let mut profile = self
            .profile_store
            .get_profile_by_pubkey(ours)
            .await?
            .ok_or_else(|| SessionError::ProfileNotFound(ours.to_string()))?;

        let mut session_snapshot = None;
        let mut ping_session_id = None;
        let mut just_connected_session_id = None;

        match pending.command {
            Command::Connect => {
                if let Some(session) = profile.session_by_id_mut(&pending.session_id) {
                    session.theirs = Some(sender_hex.to_string());
                    session.status = SessionStatus::Connected;
                    session_snapshot = Some(session.clone());
                    just_connected_session_id = Some(pending.session_id.clone());
                }
            }
            Command::Ping => {
                if let Some(session) = profile.session_by_id_mut(&pending.session_id) {
                    session.status = SessionStatus::Connected;
                    session_snapshot = Some(session.clone());
                }
                ping_session_id = Some(pending.session_id.clone());
            }
            Command::Disconnect => {
                if response.is_ok() {
                    profile.remove_session(&pending.session_id);
                }
            }
            _ => {} // default no-op; higher layers subscribe via notifications
        }

        self.profile_store.upsert_profile(profile).await?;
        if let Some(session) = session_snapshot {
            log_state_change(&session);
            let _ = self.notify.send(EngineNotification::SessionStateChanged(session));
        }
        if let Some(session_id) = ping_session_id {
            let _ = self.notify.send(EngineNotification::PingReceived { session_id });
        }
        if let Some(session_id) = just_connected_session_id {
            self.send_ping(ours, &session_id).await?;
        }
        Ok(())
    }

    async fn load_or_create_profile(&self, ours: &str) -> Result<Profile, SessionError> {
        Ok(self
            .profile_store
            .get_profile_by_pubkey(ours)
            .await?
            .unwrap_or_else(|| Profile::new(ours.to_string())))
    }

    async fn load_private_key(&self, ours: &str) -> Result<PrivateKey, SessionError> {
        let scoped = self.key_store.load_key(ours).await?;
        Ok(PrivateKey::from_bytes(scoped.bytes())?)
    }

    /// Build and sign an outbound event, drawing aux-rand from the
    /// configured RNG rather than the OS CSPRNG directly, so it can be
    /// fixed in tests. Synchronous: the lock is never held across an
    /// `.await`.
    fn build_outbound_event(
        &self,
        ours_hex: &str,
        theirs_hex: &str,
        plaintext: &str,
        created_at: i64,
        key: &PrivateKey,
    ) -> Result<Event, SessionError> {
        let mut rng = self.config.rng.lock().unwrap();
        build_event(ours_hex, theirs_hex, plaintext, created_at, key, &mut *rng)
    }
}

/// Logs a session reaching a new state at `info`, per the structured-
/// logging requirement on session-state transitions.
fn log_state_change(session: &Session) {
    tracing::info!(
        session_id = %session.session_id,
        pubkey = %session.ours,
        peer = session.theirs.as_deref().unwrap_or(""),
        status = ?session.status,
        "session state changed"
    );
}

#[derive(Debug, Deserialize)]
struct UnsignedEvent {
    #[serde(default)]
    created_at: Option<i64>,
    kind: i64,
    #[serde(default)]
    tags: Vec<Tag>,
    content: String,
}

fn handle_cipher_command(key: &PrivateKey, command: Command, params: &[String]) -> Result<String, SessionError> {
    if params.len() < 2 {
        return Err(ProtoError::MalformedFrame("cipher commands require two params".into()).into());
    }
    let peer_bytes = decode_pubkey(&params[0])?;
    let shared = key.ecdh(&peer_bytes)?;
    let payload = &params[1];
    let result = match command {
        Command::Nip04Encrypt => nip04::encrypt(&shared, payload)?,
        Command::Nip04Decrypt => nip04::decrypt(&shared, payload)?,
        Command::Nip44Encrypt => nip44::encrypt(&shared, payload)?,
        Command::Nip44Decrypt => nip44::decrypt(&shared, payload)?,
        _ => unreachable!("only cipher commands reach this function"),
    };
    Ok(result)
}

fn build_event(
    ours_hex: &str,
    theirs_hex: &str,
    plaintext: &str,
    created_at: i64,
    key: &PrivateKey,
    rng: &mut dyn SecureRng,
) -> Result<Event, SessionError> {
    let peer_bytes = decode_pubkey(theirs_hex)?;
    let shared = key.ecdh(&peer_bytes)?;
    let sealed = nip44::encrypt(&shared, plaintext)?;
    let tags = vec![vec!["p".to_string(), theirs_hex.to_string()]];
    Ok(event::sign_event(ours_hex, created_at, NOSTR_CONNECT_KIND, tags, sealed, |digest| {
        key.sign_schnorr_with_rng(digest, rng)
    }))
}

fn verify_inbound_event(evt: &Event) -> Result<(), SessionError> {
    event::verify_event(evt, |digest, sig, pubkey_hex| {
        let Ok(bytes) = hex::decode(pubkey_hex) else { return false };
        let Ok(pubkey): Result<[u8; 32], _> = bytes.try_into() else { return false };
        schnorr::verify(digest, sig, &pubkey)
    })
    .map_err(SessionError::from)
}

fn decode_pubkey(hex_str: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(hex::decode(hex_str)?)
}

fn random_secret(rng: &mut dyn SecureRng) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn request_id_of(plaintext: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(plaintext)
        .ok()?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::test_doubles::{InMemoryKeyStore, InMemoryProfileStore, InMemoryRelay};
    use std::time::Duration;

    fn test_config() -> EngineConfig {
        EngineConfig {
            subscription_timeout: Duration::from_millis(200),
            ..EngineConfig::default()
        }
    }

    fn facade(relay: Arc<InMemoryRelay>) -> (IdentityFacade, mpsc::UnboundedReceiver<EngineNotification>) {
        IdentityFacade::new(
            Arc::new(InMemoryProfileStore::default()),
            Arc::new(InMemoryKeyStore::default()),
            relay,
            test_config(),
        )
    }

    #[tokio::test]
    async fn handshake_reaches_connected_on_both_sides_and_pings() {
        let relay = Arc::new(InMemoryRelay::new());
        let (initiator, _init_rx) = facade(relay.clone());
        let (acceptor, _acc_rx) = facade(relay.clone());

        let initiator_pubkey = initiator.create_profile(None).await.unwrap();
        let acceptor_pubkey = acceptor.create_profile(None).await.unwrap();

        let (session, uri) = initiator
            .open_session(&initiator_pubkey, vec!["wss://relay".into()], vec![])
            .await
            .unwrap();
        let parsed = ConnectionUri::parse(&uri).unwrap();

        acceptor
            .on_scan(
                &acceptor_pubkey,
                &parsed.pubkey,
                parsed.relays.clone(),
                parsed.secret.clone(),
                parsed.perms.clone(),
            )
            .await
            .unwrap();

        // connect response -> initiator (sets theirs, Connected, sends ping)
        assert!(initiator.run_dispatch_once(&initiator_pubkey).await.unwrap());
        // ping request -> acceptor (replies pong)
        assert!(acceptor.run_dispatch_once(&acceptor_pubkey).await.unwrap());
        // pong response -> initiator
        assert!(initiator.run_dispatch_once(&initiator_pubkey).await.unwrap());

        let initiator_session = initiator.get_session(&initiator_pubkey, &session.session_id).await.unwrap().unwrap();
        assert!(initiator_session.is_connected());
        assert_eq!(initiator_session.theirs.as_deref(), Some(acceptor_pubkey.as_str()));
    }

    #[tokio::test]
    async fn disconnect_removes_session_on_both_sides() {
        let relay = Arc::new(InMemoryRelay::new());
        let (initiator, _init_rx) = facade(relay.clone());
        let (acceptor, _acc_rx) = facade(relay.clone());

        let initiator_pubkey = initiator.create_profile(None).await.unwrap();
        let acceptor_pubkey = acceptor.create_profile(None).await.unwrap();

        let (session, uri) = initiator
            .open_session(&initiator_pubkey, vec!["wss://relay".into()], vec![])
            .await
            .unwrap();
        let parsed = ConnectionUri::parse(&uri).unwrap();

        acceptor
            .on_scan(&acceptor_pubkey, &parsed.pubkey, parsed.relays.clone(), parsed.secret.clone(), parsed.perms.clone())
            .await
            .unwrap();
        assert!(initiator.run_dispatch_once(&initiator_pubkey).await.unwrap()); // connect response
        assert!(acceptor.run_dispatch_once(&acceptor_pubkey).await.unwrap()); // ping request
        assert!(initiator.run_dispatch_once(&initiator_pubkey).await.unwrap()); // pong response

        initiator.send_disconnect(&initiator_pubkey, &session.session_id).await.unwrap();
        assert!(acceptor.run_dispatch_once(&acceptor_pubkey).await.unwrap()); // disconnect request
        assert!(initiator.run_dispatch_once(&initiator_pubkey).await.unwrap()); // ack response

        assert!(initiator.get_session(&initiator_pubkey, &session.session_id).await.unwrap().is_none());
        let acceptor_profile_sessions = acceptor
            .profile_store
            .get_profile_by_pubkey(&acceptor_pubkey)
            .await
            .unwrap()
            .unwrap()
            .sessions;
        assert!(acceptor_profile_sessions.is_empty());
    }

    #[tokio::test]
    async fn unknown_method_gets_a_protocol_error_reply_not_a_silent_drop() {
        let relay = Arc::new(InMemoryRelay::new());
        let (a, _a_rx) = facade(relay.clone());
        let (b, _b_rx) = facade(relay.clone());

        let a_pubkey = a.create_profile(None).await.unwrap();
        let b_pubkey = b.create_profile(None).await.unwrap();

        let (_session, uri) = a.open_session(&a_pubkey, vec!["wss://relay".into()], vec![]).await.unwrap();
        let parsed = ConnectionUri::parse(&uri).unwrap();
        b.on_scan(&b_pubkey, &parsed.pubkey, parsed.relays.clone(), parsed.secret.clone(), parsed.perms.clone())
            .await
            .unwrap();
        assert!(a.run_dispatch_once(&a_pubkey).await.unwrap()); // connect response, a now knows theirs=b
        assert!(b.run_dispatch_once(&b_pubkey).await.unwrap()); // ping request from a's connect handling
        assert!(a.run_dispatch_once(&a_pubkey).await.unwrap()); // pong

        // Now send a's side a raw bogus-method request, bypassing the closed
        // Command enum entirely, and confirm b replies with an error frame
        // rather than dropping it.
        let key = a.load_private_key(&a_pubkey).await.unwrap();
        let bogus = r#"{"id":"bogus-1","method":"not_a_real_command","params":[]}"#;
        let event = build_event(&a_pubkey, &b_pubkey, bogus, 1_700_000_000, &key, &mut rand::rngs::OsRng).unwrap();
        b.dispatch_inbound(&b_pubkey, event).await;

        let reply = a.transport.recv(&a_pubkey, Duration::from_millis(200)).await.unwrap();
        assert!(reply.is_some());
    }
}
