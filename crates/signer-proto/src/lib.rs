//! signer-proto — wire types and serialization for the remote-signer core.
//!
//! # Modules
//! - `event`    — canonical event serialization, id hashing, sign/verify plumbing
//! - `command`  — the closed RPC command set and its wire mapping
//! - `envelope` — request/response JSON frames
//! - `uri`      — the `nostrconnect://` bootstrap URI
//! - `error`    — unified error type

pub mod command;
pub mod envelope;
pub mod error;
pub mod event;
pub mod uri;

pub use command::Command;
pub use envelope::{RequestFrame, ResponseFrame};
pub use error::ProtoError;
pub use event::{Event, Tag, NOSTR_CONNECT_KIND};
pub use uri::ConnectionUri;
