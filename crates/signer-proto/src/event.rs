//! Event codec: canonical serialization, id hashing, signature
//! attachment and verification.
//!
//! Canonical form for `id`/signing is the literal JSON array
//! `[0,"<pubkey-hex-lower>",<created_at>,<kind>,<tags>,"<content>"]` with
//! no insignificant whitespace. This is authoritative even though some
//! upstream implementations occasionally sign the JSON object form
//! instead.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ProtoError;

/// The fixed event kind for the remote-signer RPC envelope ("Nostr
/// Connect"). Both peers must agree on this integer.
pub const NOSTR_CONNECT_KIND: i64 = 24133;

/// A tag is an ordered sequence of strings; element 0 is the tag key
/// (e.g. `"p"` for a referenced pubkey).
pub type Tag = Vec<String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: i64,
    pub tags: Vec<Tag>,
    pub content: String,
    pub sig: String,
}

/// Serialize the canonical array form used for id computation/signing.
fn canonical_bytes(pubkey: &str, created_at: i64, kind: i64, tags: &[Tag], content: &str) -> Vec<u8> {
    let value = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    serde_json::to_vec(&value).expect("canonical event array always serializes")
}

/// SHA-256 of the canonical serialization, as the 32-byte digest used for
/// Schnorr signing (not yet hex-encoded).
pub fn compute_id_digest(pubkey: &str, created_at: i64, kind: i64, tags: &[Tag], content: &str) -> [u8; 32] {
    let bytes = canonical_bytes(pubkey, created_at, kind, tags, content);
    Sha256::digest(bytes).into()
}

/// Build and sign an event, given a signing closure that performs the
/// BIP-340 Schnorr signature over the raw 32-byte id digest. The closure
/// indirection keeps this module free of any dependency on
/// `signer-crypto`'s key types, matching the layering where `signer-proto`
/// only knows about wire shapes.
pub fn sign_event<F>(
    pubkey_hex: &str,
    created_at: i64,
    kind: i64,
    tags: Vec<Tag>,
    content: String,
    sign: F,
) -> Event
where
    F: FnOnce(&[u8; 32]) -> [u8; 64],
{
    let digest = compute_id_digest(pubkey_hex, created_at, kind, &tags, &content);
    let sig = sign(&digest);
    Event {
        id: hex::encode(digest),
        pubkey: pubkey_hex.to_string(),
        created_at,
        kind,
        tags,
        content,
        sig: hex::encode(sig),
    }
}

/// Recompute the canonical id and verify the attached signature via the
/// supplied verification closure.
pub fn verify_event<F>(event: &Event, verify: F) -> Result<(), ProtoError>
where
    F: FnOnce(&[u8; 32], &[u8; 64], &str) -> bool,
{
    let digest = compute_id_digest(
        &event.pubkey,
        event.created_at,
        event.kind,
        &event.tags,
        &event.content,
    );
    if hex::encode(digest) != event.id {
        return Err(ProtoError::IdMismatch);
    }
    let sig_bytes: [u8; 64] = hex::decode(&event.sig)?
        .try_into()
        .map_err(|_| ProtoError::BadSignature)?;
    if verify(&digest, &sig_bytes, &event.pubkey) {
        Ok(())
    } else {
        Err(ProtoError::BadSignature)
    }
}
