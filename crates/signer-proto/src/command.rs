//! The closed set of RPC commands and their wire (snake_case) mapping.

use std::fmt;

use crate::error::ProtoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    SignEvent,
    Ping,
    GetPublicKey,
    Nip04Encrypt,
    Nip04Decrypt,
    Nip44Encrypt,
    Nip44Decrypt,
    Disconnect,
}

impl Command {
    /// All nine commands, in no particular order — used by tests that
    /// want to exercise the full closed set.
    pub const ALL: [Command; 9] = [
        Command::Connect,
        Command::SignEvent,
        Command::Ping,
        Command::GetPublicKey,
        Command::Nip04Encrypt,
        Command::Nip04Decrypt,
        Command::Nip44Encrypt,
        Command::Nip44Decrypt,
        Command::Disconnect,
    ];

    pub fn to_wire_str(self) -> &'static str {
        match self {
            Command::Connect => "connect",
            Command::SignEvent => "sign_event",
            Command::Ping => "ping",
            Command::GetPublicKey => "get_public_key",
            Command::Nip04Encrypt => "nip04_encrypt",
            Command::Nip04Decrypt => "nip04_decrypt",
            Command::Nip44Encrypt => "nip44_encrypt",
            Command::Nip44Decrypt => "nip44_decrypt",
            Command::Disconnect => "disconnect",
        }
    }

    pub fn parse(wire: &str) -> Result<Command, ProtoError> {
        match wire {
            "connect" => Ok(Command::Connect),
            "sign_event" => Ok(Command::SignEvent),
            "ping" => Ok(Command::Ping),
            "get_public_key" => Ok(Command::GetPublicKey),
            "nip04_encrypt" => Ok(Command::Nip04Encrypt),
            "nip04_decrypt" => Ok(Command::Nip04Decrypt),
            "nip44_encrypt" => Ok(Command::Nip44Encrypt),
            "nip44_decrypt" => Ok(Command::Nip44Decrypt),
            "disconnect" => Ok(Command::Disconnect),
            other => Err(ProtoError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_wire_str())
    }
}
