//! The three external collaborators this core treats as abstract: relay
//! transport, profile persistence, and the secure key store. Only trait
//! definitions and in-memory test doubles live here — no concrete relay
//! client, database, or OS keychain binding.

use std::time::Duration;

use async_trait::async_trait;
use zeroize::Zeroize;

use signer_proto::Event;

use crate::error::SessionError;
use crate::profile::Profile;

/// A short-lived handle to a 32-byte private key, zeroized when it drops.
/// Dyn-compatible stand-in for the closure-scoped `with_key` pattern: trait
/// objects can't carry generic methods, so the scoping is expressed as a
/// guard value instead of a callback.
pub struct ScopedKey(pub(crate) [u8; 32]);

impl ScopedKey {
    pub fn bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for ScopedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile_by_pubkey(&self, pubkey: &str) -> Result<Option<Profile>, SessionError>;
    async fn list_profiles(&self) -> Result<Vec<Profile>, SessionError>;
    async fn upsert_profile(&self, profile: Profile) -> Result<(), SessionError>;
    /// Deletes the profile and cascades to its sessions and their pending
    /// entries.
    async fn delete_profile(&self, pubkey: &str) -> Result<(), SessionError>;
}

#[async_trait]
pub trait SecureKeyStore: Send + Sync {
    /// Keyed by `"userkeypair_" ∥ pubkey` conceptually; implementations may
    /// choose their own storage key as long as `store_key`/`load_key` agree.
    async fn load_key(&self, pubkey: &str) -> Result<ScopedKey, SessionError>;
    async fn store_key(&self, pubkey: &str, key: [u8; 32]) -> Result<(), SessionError>;
}

#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Idempotent per pubkey: subscribes with a filter matching the
    /// "Nostr Connect" kind, `since: now - 30s`, and a `p` tag on `pubkey`.
    async fn listen(&self, pubkey: &str, relays: &[String]) -> Result<(), SessionError>;
    /// Best-effort publish; transient relay failures must not block the
    /// caller beyond surfacing the error.
    async fn publish(&self, event: &Event) -> Result<(), SessionError>;
    /// Pull the next inbound event addressed to `pubkey`'s subscription
    /// (call [`RelayTransport::listen`] first), or `None` if nothing
    /// arrives within `timeout`.
    async fn recv(&self, pubkey: &str, timeout: Duration) -> Result<Option<Event>, SessionError>;
}


#[cfg(test)]
mod tests {
    use super::test_doubles::{InMemoryKeyStore, InMemoryProfileStore};
    use super::*;

    #[tokio::test]
    async fn key_store_round_trips_and_zeroizes_on_drop() {
        let store = InMemoryKeyStore::default();
        let pubkey = "a".repeat(64);
        store.store_key(&pubkey, [7u8; 32]).await.unwrap();
        let scoped = store.load_key(&pubkey).await.unwrap();
        assert_eq!(scoped.bytes(), &[7u8; 32]);
    }

    #[tokio::test]
    async fn profile_store_upsert_then_get_round_trips() {
        let store = InMemoryProfileStore::default();
        let profile = Profile::new("a".repeat(64));
        store.upsert_profile(profile.clone()).await.unwrap();
        let fetched = store.get_profile_by_pubkey(&profile.pubkey).await.unwrap();
        assert_eq!(fetched, Some(profile));
    }

    #[tokio::test]
    async fn profile_store_delete_removes_profile() {
        let store = InMemoryProfileStore::default();
        let profile = Profile::new("a".repeat(64));
        store.upsert_profile(profile.clone()).await.unwrap();
        store.delete_profile(&profile.pubkey).await.unwrap();
        assert!(store.get_profile_by_pubkey(&profile.pubkey).await.unwrap().is_none());
    }
}
