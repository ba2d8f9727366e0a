//! BIP-340 Schnorr signatures over secp256k1: tagged hashes, sign, verify.

use secp256k1::{schnorr::Signature, Keypair, Message, SECP256K1};
use sha2::{Digest, Sha256};

use crate::curve::XOnlyBytes;
use crate::error::CryptoError;

/// `tagged_hash(tag, m) = SHA256(SHA256(tag) || SHA256(tag) || m)` (BIP-340 §Design).
pub fn tagged_hash(tag: &str, msg: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(msg);
    hasher.finalize().into()
}

/// BIP-340 tag strings used by this core.
pub mod tags {
    pub const AUX: &str = "BIP0340/aux";
    pub const NONCE: &str = "BIP0340/nonce";
    pub const CHALLENGE: &str = "BIP0340/challenge";
}

/// `k = int(tagged_hash("BIP0340/nonce", t || P.x || m)) mod n`, where
/// `t = xor(d, tagged_hash("BIP0340/aux", aux_rand))`. Exposed separately
/// from `sign` so callers (and tests) can inspect the deterministic
/// nonce-derivation step in isolation.
pub fn compute_nonce_preimage(d: &[u8; 32], pubkey_x: &XOnlyBytes, msg32: &[u8; 32], aux_rand: &[u8; 32]) -> [u8; 32] {
    let aux_hash = tagged_hash(tags::AUX, aux_rand);
    let mut t = [0u8; 32];
    for i in 0..32 {
        t[i] = d[i] ^ aux_hash[i];
    }
    let mut preimage = Vec::with_capacity(96);
    preimage.extend_from_slice(&t);
    preimage.extend_from_slice(pubkey_x);
    preimage.extend_from_slice(msg32);
    tagged_hash(tags::NONCE, &preimage)
}

/// Sign a 32-byte message with BIP-340 Schnorr using the supplied
/// auxiliary randomness. The curve-arithmetic steps (nonce point,
/// y-parity negation, challenge, final scalar) are delegated to
/// libsecp256k1's `sign_schnorr_with_aux_rand`, which implements exactly
/// the six steps of BIP-340 §Signing.
pub fn sign(msg32: &[u8; 32], d: &secp256k1::SecretKey, aux_rand: &[u8; 32]) -> [u8; 64] {
    let keypair = Keypair::from_secret_key(SECP256K1, d);
    let msg = Message::from_digest(*msg32);
    let sig = SECP256K1.sign_schnorr_with_aux_rand(&msg, &keypair, aux_rand);
    *sig.as_ref()
}

/// Convenience: sign using fresh OS randomness for the aux-rand input.
pub fn sign_with_os_rng(msg32: &[u8; 32], d: &secp256k1::SecretKey) -> [u8; 64] {
    sign_with_rng(msg32, d, &mut rand::rngs::OsRng)
}

/// Sign using an injected randomness source for the aux-rand input,
/// e.g. a fixed-seed RNG so tests can reproduce a known signature.
pub fn sign_with_rng(msg32: &[u8; 32], d: &secp256k1::SecretKey, rng: &mut dyn crate::SecureRng) -> [u8; 64] {
    use rand::RngCore;
    let mut aux_rand = [0u8; 32];
    rng.fill_bytes(&mut aux_rand);
    sign(msg32, d, &aux_rand)
}

/// Verify a 64-byte Schnorr signature against an x-only public key. Any
/// malformed input (wrong lengths, `r >= p`, `s >= n`, off-curve `P`)
/// yields `false` rather than an error — verification never throws.
pub fn verify(msg32: &[u8; 32], sig: &[u8; 64], pubkey_x: &XOnlyBytes) -> bool {
    let Ok(sig) = Signature::from_slice(sig) else {
        return false;
    };
    let Ok(xonly) = secp256k1::XOnlyPublicKey::from_slice(pubkey_x) else {
        return false;
    };
    let msg = Message::from_digest(*msg32);
    SECP256K1.verify_schnorr(&sig, &msg, &xonly).is_ok()
}

/// Derive the 32-byte x-only public key for a validated private key.
pub fn pubkey_for(d: &secp256k1::SecretKey) -> XOnlyBytes {
    crate::curve::xonly_pub(d)
}

pub fn parse_secret_key(hex_d: &str) -> Result<secp256k1::SecretKey, CryptoError> {
    let bytes = hex::decode(hex_d)?;
    crate::curve::validate_private(&bytes)
}
