//! secp256k1 curve primitives: key validation, x-only encodings, ECDH.
//!
//! Wraps the `secp256k1` crate (the same library the `bitcoin` crate
//! re-exports) rather than hand-rolling field arithmetic — point
//! operations and on-curve checks are delegated to libsecp256k1.

use secp256k1::{PublicKey, Scalar, SecretKey, XOnlyPublicKey, SECP256K1};

use crate::error::CryptoError;

/// A 32-byte x-only public key, lowercase-hex serializable.
pub type XOnlyBytes = [u8; 32];

/// Validate a 32-byte big-endian scalar as a private key: `1 <= d < n`.
pub fn validate_private(d: &[u8]) -> Result<SecretKey, CryptoError> {
    SecretKey::from_slice(d).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
}

/// The 32-byte big-endian x-coordinate of `d*G`.
pub fn xonly_pub(d: &SecretKey) -> XOnlyBytes {
    let (xonly, _parity) = d.x_only_public_key(SECP256K1);
    xonly.serialize()
}

/// The 33-byte SEC1-compressed public key (prefix 0x02/0x03 by y-parity).
pub fn compressed_pub(d: &SecretKey) -> [u8; 33] {
    PublicKey::from_secret_key(SECP256K1, d).serialize()
}

/// Recover the full point from an x-only public key, choosing the y
/// coordinate whose parity matches `odd_y`. Fails when `x` is not a valid
/// x-coordinate on the curve.
pub fn decompress_xonly(x: &XOnlyBytes, odd_y: bool) -> Result<PublicKey, CryptoError> {
    let xonly = XOnlyPublicKey::from_slice(x).map_err(|_| CryptoError::NotOnCurve)?;
    let parity = if odd_y {
        secp256k1::Parity::Odd
    } else {
        secp256k1::Parity::Even
    };
    xonly
        .public_key(parity)
        .map_err(|_| CryptoError::NotOnCurve)
}

/// Parse a peer public key supplied as 32 (x-only), 33 (compressed), or
/// 65 (uncompressed) bytes into a full curve point.
///
/// For the 32-byte x-only form, libsecp256k1 has no notion of parity, so
/// both parities are tried in order (even first, then odd). The resulting
/// shared secret's x-coordinate is identical either way — negating the
/// peer's y negates the shared point but not its x-coordinate — so this
/// choice is unobservable to callers and is made solely to find *a* point
/// that lies on the curve.
fn parse_peer_pubkey(q: &[u8]) -> Result<PublicKey, CryptoError> {
    match q.len() {
        32 => {
            let x: XOnlyBytes = q.try_into().expect("length checked above");
            decompress_xonly(&x, false).or_else(|_| decompress_xonly(&x, true))
        }
        33 | 65 => {
            PublicKey::from_slice(q).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
        }
        other => Err(CryptoError::InvalidPublicKey(format!(
            "unsupported public key length: {other}"
        ))),
    }
}

/// Raw (unhashed) ECDH: compute `d*Q` and return its 32-byte x-coordinate.
///
/// `q` may be 32 (x-only), 33 (compressed), or 65 (uncompressed) bytes.
pub fn ecdh(d: &SecretKey, q: &[u8]) -> Result<XOnlyBytes, CryptoError> {
    let point = parse_peer_pubkey(q)?;
    let scalar = Scalar::from_be_bytes(d.secret_bytes())
        .map_err(|_| CryptoError::InvalidPrivateKey("scalar out of range".into()))?;
    let shared = point
        .mul_tweak(SECP256K1, &scalar)
        .map_err(|_| CryptoError::NotOnCurve)?;
    let compressed = shared.serialize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&compressed[1..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_private_rejects_zero() {
        assert!(validate_private(&[0u8; 32]).is_err());
    }

    #[test]
    fn xonly_pub_is_32_bytes_and_deterministic() {
        let d = validate_private(&[1u8; 32]).unwrap();
        let p1 = xonly_pub(&d);
        let p2 = xonly_pub(&d);
        assert_eq!(p1, p2);
        assert_eq!(p1.len(), 32);
    }

    #[test]
    fn ecdh_is_symmetric() {
        let da = validate_private(&[2u8; 32]).unwrap();
        let db = validate_private(&[3u8; 32]).unwrap();
        let qa = xonly_pub(&da);
        let qb = xonly_pub(&db);

        let shared_ab = ecdh(&da, &qb).unwrap();
        let shared_ba = ecdh(&db, &qa).unwrap();
        assert_eq!(shared_ab, shared_ba);
    }

    #[test]
    fn ecdh_accepts_compressed_and_xonly_forms() {
        let da = validate_private(&[2u8; 32]).unwrap();
        let db = validate_private(&[3u8; 32]).unwrap();
        let qb_xonly = xonly_pub(&db);
        let qb_compressed = compressed_pub(&db);

        let shared_xonly = ecdh(&da, &qb_xonly).unwrap();
        let shared_compressed = ecdh(&da, &qb_compressed).unwrap();
        assert_eq!(shared_xonly, shared_compressed);
    }

    #[test]
    fn ecdh_rejects_bad_length() {
        let da = validate_private(&[2u8; 32]).unwrap();
        assert!(ecdh(&da, &[0u8; 10]).is_err());
    }
}
