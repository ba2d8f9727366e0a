//! NIP-04 (legacy) encrypted direct messages: AES-256-CBC/PKCS7 over an
//! ECDH shared secret, wire format `base64(ct)?iv=base64(iv)`.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encrypt `plaintext` under the 32-byte ECDH shared secret `shared_x`.
pub fn encrypt(shared_x: &[u8; 32], plaintext: &str) -> Result<String, CryptoError> {
    let mut iv = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let pt = plaintext.as_bytes();
    let mut buf = vec![0u8; pt.len() + 16];
    buf[..pt.len()].copy_from_slice(pt);

    let ct = Aes256CbcEnc::new(shared_x.into(), &iv.into())
        .encrypt_padded_mut::<Pkcs7>(&mut buf, pt.len())
        .map_err(|e| CryptoError::AesCbc(e.to_string()))?;

    Ok(format!("{}?iv={}", B64.encode(ct), B64.encode(iv)))
}

/// Decrypt a NIP-04 payload produced by [`encrypt`].
pub fn decrypt(shared_x: &[u8; 32], payload: &str) -> Result<String, CryptoError> {
    let mut parts = payload.split("?iv=");
    let (Some(ct_b64), Some(iv_b64), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CryptoError::MalformedPayload(
            "expected \"<ct>?iv=<iv>\"".into(),
        ));
    };

    let mut ct = B64.decode(ct_b64)?;
    let iv = B64.decode(iv_b64)?;
    if iv.len() != 16 {
        return Err(CryptoError::MalformedPayload(format!(
            "invalid IV length: {} (expected 16)",
            iv.len()
        )));
    }

    let pt = Aes256CbcDec::new(shared_x.into(), iv.as_slice().into())
        .decrypt_padded_mut::<Pkcs7>(&mut ct)
        .map_err(|e| CryptoError::AesCbc(e.to_string()))?;

    String::from_utf8(pt.to_vec()).map_err(|e| CryptoError::MalformedPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let shared = [7u8; 32];
        let ct = encrypt(&shared, "hello nip-04").unwrap();
        assert!(ct.contains("?iv="));
        let pt = decrypt(&shared, &ct).unwrap();
        assert_eq!(pt, "hello nip-04");
    }

    #[test]
    fn decrypt_rejects_missing_iv_marker() {
        let shared = [7u8; 32];
        assert!(decrypt(&shared, "not-a-valid-payload").is_err());
    }

    #[test]
    fn decrypt_rejects_extra_split_parts() {
        let shared = [7u8; 32];
        assert!(decrypt(&shared, "a?iv=b?iv=c").is_err());
    }

    #[test]
    fn decrypt_fails_with_wrong_shared_secret() {
        let shared = [7u8; 32];
        let other = [8u8; 32];
        let ct = encrypt(&shared, "secret message").unwrap();
        assert!(decrypt(&other, &ct).is_err());
    }
}
