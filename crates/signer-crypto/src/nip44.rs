//! NIP-44 v2 encrypted payloads: HKDF-SHA256 key derivation, ChaCha20
//! stream cipher (not AEAD), HMAC-SHA256 authentication, and
//! length-prefixed zero-padding to a bucketed size.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

const VERSION: u8 = 0x02;
const SALT: &[u8] = b"nip44-v2";
const MESSAGE_KEYS_LEN: usize = 76;
const MIN_PLAINTEXT_LEN: usize = 1;
const MAX_PLAINTEXT_LEN: usize = 65535;

/// The conversation key `ck = HKDF-Extract(salt="nip44-v2", ikm=ecdh_x)`.
/// Reusable across many messages exchanged between the same two parties.
pub struct ConversationKey([u8; 32]);

impl ConversationKey {
    pub fn derive(shared_x: &[u8; 32]) -> Self {
        let (prk, _) = Hkdf::<Sha256>::extract(Some(SALT), shared_x);
        let mut ck = [0u8; 32];
        ck.copy_from_slice(&prk);
        Self(ck)
    }
}

struct MessageKeys {
    chacha_key: [u8; 32],
    chacha_nonce: [u8; 12],
    hmac_key: [u8; 32],
}

/// Per-message keys: `HKDF-Expand(prk=ck, info=nonce, L=76)`, split into a
/// 32-byte ChaCha20 key, a 12-byte ChaCha20 nonce, and a 32-byte HMAC key.
fn derive_message_keys(ck: &ConversationKey, nonce: &[u8; 32]) -> Result<MessageKeys, CryptoError> {
    let hk = Hkdf::<Sha256>::from_prk(&ck.0)
        .map_err(|e| CryptoError::KeyDerivation(format!("invalid PRK: {e}")))?;
    let mut okm = [0u8; MESSAGE_KEYS_LEN];
    hk.expand(nonce, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand: {e}")))?;

    let mut chacha_key = [0u8; 32];
    let mut chacha_nonce = [0u8; 12];
    let mut hmac_key = [0u8; 32];
    chacha_key.copy_from_slice(&okm[0..32]);
    chacha_nonce.copy_from_slice(&okm[32..44]);
    hmac_key.copy_from_slice(&okm[44..76]);
    Ok(MessageKeys {
        chacha_key,
        chacha_nonce,
        hmac_key,
    })
}

/// The padded length for a plaintext of `len` bytes: 32 if `len <= 32`,
/// otherwise the next multiple of a size-dependent chunk that is `>= len`.
fn calc_padded_len(len: usize) -> Result<usize, CryptoError> {
    if len < MIN_PLAINTEXT_LEN || len > MAX_PLAINTEXT_LEN {
        return Err(CryptoError::MessageLength(len));
    }
    if len <= 32 {
        return Ok(32);
    }
    let next_power = len.next_power_of_two();
    let chunk = if next_power <= 256 { 32 } else { next_power / 8 };
    Ok(chunk * (((len - 1) / chunk) + 1))
}

/// `[len: u16 BE][plaintext][zero padding to calc_padded_len(len)]`.
fn pad(plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let len = plaintext.len();
    let padded_len = calc_padded_len(len)?;
    let mut out = Vec::with_capacity(2 + padded_len);
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(plaintext);
    out.resize(2 + padded_len, 0);
    Ok(out)
}

/// Inverse of [`pad`]; validates the length prefix against the padded
/// buffer size rather than trusting it blindly.
fn unpad(padded: &[u8]) -> Result<&[u8], CryptoError> {
    if padded.len() < 2 {
        return Err(CryptoError::PaddingError("buffer shorter than length prefix".into()));
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    let expected_total = 2 + calc_padded_len(len)?;
    if padded.len() != expected_total {
        return Err(CryptoError::PaddingError(format!(
            "padded length {} does not match expected {} for plaintext length {}",
            padded.len(),
            expected_total,
            len
        )));
    }
    Ok(&padded[2..2 + len])
}

/// Encrypt `plaintext` for `shared_x` using a freshly generated 32-byte
/// nonce. `1 <= plaintext.len() <= 65535`.
pub fn encrypt(shared_x: &[u8; 32], plaintext: &str) -> Result<String, CryptoError> {
    let mut nonce = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    encrypt_with_nonce(shared_x, plaintext.as_bytes(), nonce)
}

/// As [`encrypt`] but with an explicit nonce, for known-answer tests.
pub fn encrypt_with_nonce(shared_x: &[u8; 32], plaintext: &[u8], nonce: [u8; 32]) -> Result<String, CryptoError> {
    let ck = ConversationKey::derive(shared_x);
    let keys = derive_message_keys(&ck, &nonce)?;

    let mut buf = pad(plaintext)?;
    let mut cipher = ChaCha20::new(&keys.chacha_key.into(), &keys.chacha_nonce.into());
    cipher.apply_keystream(&mut buf);

    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&keys.hmac_key)
        .expect("HMAC accepts any key length");
    mac.update(&nonce);
    mac.update(&buf);
    let tag = mac.finalize().into_bytes();

    let mut payload = Vec::with_capacity(1 + 32 + buf.len() + 32);
    payload.push(VERSION);
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&buf);
    payload.extend_from_slice(&tag);
    Ok(B64.encode(payload))
}

/// Decrypt a payload produced by [`encrypt`] / [`encrypt_with_nonce`].
pub fn decrypt(shared_x: &[u8; 32], payload_b64: &str) -> Result<String, CryptoError> {
    let payload = B64.decode(payload_b64)?;
    if payload.len() < 1 + 32 + 32 {
        return Err(CryptoError::MalformedPayload("payload too short".into()));
    }
    if payload[0] != VERSION {
        return Err(CryptoError::MalformedPayload(format!(
            "unsupported version byte: {:#x}",
            payload[0]
        )));
    }

    let nonce: [u8; 32] = payload[1..33].try_into().expect("length checked above");
    let mac_start = payload.len() - 32;
    let ct = &payload[33..mac_start];
    let received_mac = &payload[mac_start..];

    let ck = ConversationKey::derive(shared_x);
    let keys = derive_message_keys(&ck, &nonce)?;

    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&keys.hmac_key)
        .expect("HMAC accepts any key length");
    mac.update(&nonce);
    mac.update(ct);
    let expected_mac = mac.finalize().into_bytes();

    if expected_mac.as_slice().ct_eq(received_mac).unwrap_u8() != 1 {
        return Err(CryptoError::AuthFail);
    }

    let mut buf = ct.to_vec();
    let mut cipher = ChaCha20::new(&keys.chacha_key.into(), &keys.chacha_nonce.into());
    cipher.apply_keystream(&mut buf);

    let plaintext = unpad(&buf)?;
    String::from_utf8(plaintext.to_vec()).map_err(|e| CryptoError::MalformedPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_table_matches_spec() {
        let cases = [
            (1usize, 32usize),
            (32, 32),
            (33, 64),
            (256, 256),
            (257, 320),
            (10000, 10240),
            (65535, 65536),
        ];
        for (len, expected) in cases {
            assert_eq!(calc_padded_len(len).unwrap(), expected, "len={len}");
        }
    }

    #[test]
    fn unpad_rejects_length_mismatch() {
        let padded = pad(b"hello").unwrap(); // 2 + 32 bytes
        let mut tampered = padded.clone();
        tampered.push(0); // now one byte too long for the recorded length
        assert!(unpad(&tampered).is_err());
        assert!(unpad(&padded).is_ok());
    }

    #[test]
    fn round_trip_for_representative_lengths() {
        let shared = [9u8; 32];
        for len in [1usize, 32, 33, 256, 257, 2000] {
            let msg: String = "x".repeat(len);
            let ct = encrypt(&shared, &msg).unwrap();
            let pt = decrypt(&shared, &ct).unwrap();
            assert_eq!(pt, msg);
        }
    }

    #[test]
    fn known_answer_shape_for_fixed_nonce() {
        let shared = [0u8; 32];
        let ct = encrypt_with_nonce(&shared, b"hello", [0u8; 32]).unwrap();
        assert!(ct.starts_with("Ag"), "base64 of a leading 0x02 byte starts with Ag");
        let raw = B64.decode(&ct).unwrap();
        // version(1) + nonce(32) + padded-ciphertext(34 = 2 + 32) + mac(32)
        assert_eq!(raw.len(), 1 + 32 + 34 + 32);
        assert_eq!(decrypt(&shared, &ct).unwrap(), "hello");
    }

    #[test]
    fn decrypt_rejects_tampered_mac() {
        let shared = [3u8; 32];
        let ct = encrypt(&shared, "tamper me").unwrap();
        let mut raw = B64.decode(&ct).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = B64.encode(raw);
        assert!(matches!(decrypt(&shared, &tampered), Err(CryptoError::AuthFail)));
    }

    #[test]
    fn decrypt_rejects_wrong_conversation_key() {
        let shared = [3u8; 32];
        let other = [4u8; 32];
        let ct = encrypt(&shared, "wrong key").unwrap();
        assert!(decrypt(&other, &ct).is_err());
    }

    #[test]
    fn encrypt_rejects_out_of_range_length() {
        let shared = [1u8; 32];
        assert!(encrypt(&shared, "").is_err());
        let too_long = "x".repeat(65536);
        assert!(encrypt(&shared, &too_long).is_err());
    }
}
