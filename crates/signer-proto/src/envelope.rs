//! JSON wire format for RPC request/response frames.
//!
//! Each `params` element (and the `result` field) is either a JSON
//! string, or — if the source literal starts and ends with matching
//! `{}`/`[]` — a structurally embedded JSON value. On decode, structural
//! values are re-serialized without whitespace into a plain `String`, so
//! the in-memory representation is always `Vec<String>` / `String`
//! regardless of how the peer encoded it. On encode, this crate always
//! emits the string form (per the design-notes resolution for
//! `sign_event`'s `params[0]`).

use serde_json::Value;

use crate::command::Command;
use crate::error::ProtoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub id: String,
    pub method: Command,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub id: String,
    pub result: String,
    pub error: String,
}

impl ResponseFrame {
    pub fn ok(id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: result.into(),
            error: String::new(),
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: String::new(),
            error: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }
}

/// Re-serialize a structural value to a compact string; pass strings
/// through unchanged.
fn normalize_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => serde_json::to_string(&other).expect("serde_json::Value always serializes"),
    }
}

/// Whether a raw wire frame carries a `method` key, distinguishing
/// requests from responses per §4.7 step 1.
pub fn is_request(json: &str) -> Result<bool, ProtoError> {
    let value: Value = serde_json::from_str(json)?;
    Ok(value.get("method").is_some())
}

pub fn decode_request(json: &str) -> Result<RequestFrame, ProtoError> {
    let value: Value = serde_json::from_str(json)?;
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtoError::MalformedFrame("missing \"id\"".into()))?
        .to_string();
    let method_str = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtoError::MalformedFrame("missing \"method\"".into()))?;
    let method = Command::parse(method_str)?;
    let params = value
        .get("params")
        .and_then(Value::as_array)
        .ok_or_else(|| ProtoError::MalformedFrame("missing \"params\"".into()))?
        .iter()
        .cloned()
        .map(normalize_value)
        .collect();
    Ok(RequestFrame { id, method, params })
}

pub fn encode_request(frame: &RequestFrame) -> String {
    let value = serde_json::json!({
        "id": frame.id,
        "method": frame.method.to_wire_str(),
        "params": frame.params,
    });
    serde_json::to_string(&value).expect("request frame always serializes")
}

pub fn decode_response(json: &str) -> Result<ResponseFrame, ProtoError> {
    let value: Value = serde_json::from_str(json)?;
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtoError::MalformedFrame("missing \"id\"".into()))?
        .to_string();
    let result = value
        .get("result")
        .cloned()
        .map(normalize_value)
        .unwrap_or_default();
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(ResponseFrame { id, result, error })
}

pub fn encode_response(frame: &ResponseFrame) -> String {
    let value = serde_json::json!({
        "id": frame.id,
        "result": frame.result,
        "error": frame.error,
    });
    serde_json::to_string(&value).expect("response frame always serializes")
}
