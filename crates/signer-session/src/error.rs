//! Unified error type for the session engine, wrapping the crypto and
//! protocol crates' errors via `#[from]` so dispatch code can use `?`
//! across the crate boundary.

use signer_crypto::CryptoError;
use signer_proto::ProtoError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("no pending request for id {0}")]
    RequestNotPending(String),

    #[error("no session for peer {0}")]
    SessionNotFound(String),

    #[error("relay unavailable: {0}")]
    RelayUnavailable(String),

    #[error("relay subscription timed out")]
    SubscriptionTimeout,

    #[error("user rejected the request")]
    UserRejected,

    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("secure key store: {0}")]
    KeyStore(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_display_without_leaking_internals() {
        let err: SessionError = CryptoError::AuthFail.into();
        assert_eq!(err.to_string(), CryptoError::AuthFail.to_string());
    }
}
