//! The `nostrconnect://` bootstrap connection URI: parse and build.
//!
//! ```text
//! uri        = "nostrconnect://" pubkey "?" param *("&" param)
//! param      = "relay=" url | "secret=" s | "perms=" csv
//!            | "name=" s | "url=" s | "image=" s
//! ```
//! All values percent-encoded. `pubkey` is 64 lowercase hex chars.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::ProtoError;

const FRAGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`').add(b'&').add(b'=').add(b'?').add(b'#');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    pub pubkey: String,
    pub relays: Vec<String>,
    pub secret: String,
    pub perms: Vec<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

impl ConnectionUri {
    pub fn build(&self) -> Result<String, ProtoError> {
        if self.pubkey.len() != 64 || !self.pubkey.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ProtoError::InvalidUri("pubkey must be 64 lowercase hex chars".into()));
        }
        if self.relays.is_empty() {
            return Err(ProtoError::InvalidUri("at least one relay is required".into()));
        }
        if self.secret.is_empty() {
            return Err(ProtoError::InvalidUri("secret must be non-empty".into()));
        }

        let mut params = Vec::new();
        for relay in &self.relays {
            params.push(format!("relay={}", encode(relay)));
        }
        params.push(format!("secret={}", encode(&self.secret)));
        if !self.perms.is_empty() {
            params.push(format!("perms={}", encode(&self.perms.join(","))));
        }
        if let Some(name) = &self.name {
            params.push(format!("name={}", encode(name)));
        }
        if let Some(url) = &self.url {
            params.push(format!("url={}", encode(url)));
        }
        if let Some(image) = &self.image {
            params.push(format!("image={}", encode(image)));
        }

        Ok(format!(
            "nostrconnect://{}?{}",
            self.pubkey.to_lowercase(),
            params.join("&")
        ))
    }

    pub fn parse(uri: &str) -> Result<ConnectionUri, ProtoError> {
        let lower = uri.to_lowercase();
        let rest = lower
            .strip_prefix("nostrconnect://")
            .ok_or_else(|| ProtoError::InvalidUri("missing nostrconnect:// scheme".into()))?;
        // Re-slice the original (non-lowercased) string so percent-encoded
        // values with uppercase hex escapes decode correctly; only the
        // scheme/pubkey portion is case-insensitive.
        let rest = &uri[uri.len() - rest.len()..];

        let (pubkey, query) = rest
            .split_once('?')
            .ok_or_else(|| ProtoError::InvalidUri("missing query parameters".into()))?;
        let pubkey = pubkey.to_lowercase();

        let mut relays = Vec::new();
        let mut secret = None;
        let mut perms = Vec::new();
        let mut name = None;
        let mut url = None;
        let mut image = None;

        for pair in query.split('&').filter(|s| !s.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ProtoError::InvalidUri(format!("malformed parameter: {pair}")))?;
            let value = decode(value)?;
            match key {
                "relay" => relays.push(value),
                "secret" => secret = Some(value),
                "perms" => perms = value.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect(),
                "name" => name = Some(value),
                "url" => url = Some(value),
                "image" => image = Some(value),
                _ => {} // unknown parameters are ignored
            }
        }

        if relays.is_empty() {
            return Err(ProtoError::InvalidUri("at least one relay is required".into()));
        }
        let secret = secret.ok_or_else(|| ProtoError::InvalidUri("secret is required".into()))?;
        if secret.is_empty() {
            return Err(ProtoError::InvalidUri("secret must be non-empty".into()));
        }

        Ok(ConnectionUri {
            pubkey,
            relays,
            secret,
            perms,
            name,
            url,
            image,
        })
    }
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, FRAGMENT).to_string()
}

fn decode(s: &str) -> Result<String, ProtoError> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|cow| cow.into_owned())
        .map_err(|e| ProtoError::InvalidUri(format!("percent-decoding failed: {e}")))
}
