//! signer-crypto — cryptographic primitives for the remote-signer core.
//!
//! # Design principles
//! - No custom field/curve arithmetic; all point operations go through
//!   the audited `secp256k1` crate.
//! - Zeroize long-term secret material on drop.
//! - Fallible operations return `CryptoError`; signature verification is
//!   the sole exception and returns a plain `bool` (never throws).
//!
//! # Module layout
//! - `curve`   — secp256k1 key validation, x-only encodings, raw ECDH
//! - `schnorr` — BIP-340 tagged hashes, sign, verify
//! - `nip04`   — legacy AES-256-CBC encrypted DMs
//! - `nip44`   — NIP-44 v2: HKDF + ChaCha20 + HMAC-SHA256 + padding
//! - `error`   — unified error type

pub mod curve;
pub mod error;
pub mod nip04;
pub mod nip44;
pub mod schnorr;

pub use error::CryptoError;

use rand::{CryptoRng, RngCore};
use zeroize::ZeroizeOnDrop;

/// Object-safe bound for an injected source of cryptographic randomness,
/// usable behind `Arc<Mutex<dyn SecureRng>>` since trait objects can't
/// carry the generic `Rng` methods directly.
pub trait SecureRng: RngCore + CryptoRng + Send {}
impl<T: RngCore + CryptoRng + Send> SecureRng for T {}

/// A 32-byte secp256k1 private key. Stores the raw scalar directly (rather
/// than a `secp256k1::SecretKey`, whose `secret_bytes()` hands back an
/// owned copy) so `Drop` actually zeroizes the bytes that were live in
/// this struct, not a throwaway copy of them.
#[derive(ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    pub fn from_hex(hex_d: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_d)?;
        Self::from_bytes(&bytes.try_into().map_err(|_| CryptoError::InvalidPrivateKey("expected 32 bytes".into()))?)
    }

    pub fn generate() -> Self {
        Self::generate_with_rng(&mut rand::rngs::OsRng)
    }

    /// Generate using an injected randomness source rather than the OS
    /// CSPRNG, e.g. a fixed-seed RNG in tests.
    pub fn generate_with_rng(rng: &mut dyn SecureRng) -> Self {
        let secret = secp256k1::SecretKey::new(rng);
        Self(secret.secret_bytes())
    }

    /// Build from a raw 32-byte scalar, e.g. one just read out of a secure
    /// key store.
    pub fn from_bytes(d: &[u8; 32]) -> Result<Self, CryptoError> {
        curve::validate_private(d)?;
        Ok(Self(*d))
    }

    pub fn inner(&self) -> secp256k1::SecretKey {
        curve::validate_private(&self.0).expect("validated at construction")
    }

    /// The 32-byte x-only public key corresponding to this private key.
    pub fn xonly_pubkey(&self) -> curve::XOnlyBytes {
        curve::xonly_pub(&self.inner())
    }

    pub fn xonly_pubkey_hex(&self) -> String {
        hex::encode(self.xonly_pubkey())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Raw ECDH against a peer public key in 32/33/65-byte form, returning
    /// the shared x-coordinate. The returned bytes are not secret-wrapped;
    /// callers that hold them across an await point are responsible for
    /// zeroizing when done, per the scoped-resource design note.
    pub fn ecdh(&self, peer_pubkey: &[u8]) -> Result<[u8; 32], CryptoError> {
        curve::ecdh(&self.inner(), peer_pubkey)
    }

    pub fn sign_schnorr(&self, msg32: &[u8; 32]) -> [u8; 64] {
        schnorr::sign_with_os_rng(msg32, &self.inner())
    }

    /// Sign using an injected randomness source for the BIP-340 aux-rand
    /// input rather than the OS CSPRNG.
    pub fn sign_schnorr_with_rng(&self, msg32: &[u8; 32], rng: &mut dyn SecureRng) -> [u8; 64] {
        schnorr::sign_with_rng(msg32, &self.inner(), rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_round_trips_through_hex() {
        let original = PrivateKey::generate();
        let bytes = original.inner().secret_bytes();
        let rebuilt = PrivateKey::from_bytes(&bytes).unwrap();
        assert_eq!(original.to_hex(), rebuilt.to_hex());
    }

    #[test]
    fn private_key_hex_round_trip() {
        let pk = PrivateKey::from_hex("0000000000000000000000000000000000000000000000000000000000000003").unwrap();
        assert_eq!(pk.to_hex(), "0000000000000000000000000000000000000000000000000000000000000003");
    }

    #[test]
    fn ecdh_via_private_key_matches_curve_module() {
        let a = PrivateKey::from_hex("0101010101010101010101010101010101010101010101010101010101010101").unwrap();
        let b = PrivateKey::generate();
        let shared_a = a.ecdh(&b.xonly_pubkey()).unwrap();
        let shared_b = b.ecdh(&a.xonly_pubkey()).unwrap();
        assert_eq!(shared_a, shared_b);
    }
}
