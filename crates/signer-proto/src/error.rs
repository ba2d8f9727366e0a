use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("event id mismatch")]
    IdMismatch,

    #[error("bad signature")]
    BadSignature,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed request/response frame: {0}")]
    MalformedFrame(String),

    #[error("invalid connection URI: {0}")]
    InvalidUri(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
