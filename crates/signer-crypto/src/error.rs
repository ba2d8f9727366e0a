use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("point is not on the curve")]
    NotOnCurve,

    #[error("NIP-44 authentication failed (MAC mismatch)")]
    AuthFail,

    #[error("NIP-44 padding error: {0}")]
    PaddingError(String),

    #[error("NIP-04 payload malformed: {0}")]
    MalformedPayload(String),

    #[error("plaintext length out of range: {0} bytes")]
    MessageLength(usize),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("AES-CBC error: {0}")]
    AesCbc(String),

    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
