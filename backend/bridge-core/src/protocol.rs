//! Wire protocol for the bridge control socket.
//!
//! The bridge speaks JSON text frames discriminated by a `type` tag.
//!
//! # Server → client
//!
//! - `pong` - liveness acknowledgment, no payload
//! - `restarting` - the bridge is about to go down deliberately
//! - `stats_stream` - optional `econet_stats` / `aunbridge_stats` objects
//! - `log` - a single bridge log line
//! - `response` - reply to a correlated request, carries `id`
//!
//! # Client → server
//!
//! - `ping` - liveness probe with the fixed identifier `0`
//! - arbitrary request objects with an injected `id` field

use serde::Deserialize;
use serde_json::{Map, Value};

/// A JSON object as carried on the wire.
pub type JsonObject = Map<String, Value>;

/// Liveness probe frame. Probes are session-wide, so the identifier is fixed
/// at `0` and never correlated against the pending request table.
pub const PING_FRAME: &str = r#"{"type":"ping","id":0}"#;

/// Decoded inbound message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    Restarting,
    StatsStream {
        #[serde(default)]
        econet_stats: Option<JsonObject>,
        #[serde(default)]
        aunbridge_stats: Option<JsonObject>,
    },
    Log {
        line: String,
    },
    Response {
        id: u64,
        #[serde(flatten)]
        body: JsonObject,
    },
}

/// Decode a single inbound text frame.
///
/// # Errors
///
/// Returns the underlying serde error if the frame is not valid JSON or does
/// not match any known message shape. Callers log and drop such frames.
pub fn decode(frame: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(frame)
}

/// Encode an outgoing request, injecting the assigned correlation identifier.
///
/// # Errors
///
/// Returns the underlying serde error if the payload cannot be serialized.
pub fn encode_request(mut payload: JsonObject, id: u64) -> Result<String, serde_json::Error> {
    payload.insert("id".to_string(), Value::from(id));
    serde_json::to_string(&Value::Object(payload))
}

/// Rebuild the full response object a resolved request is handed back.
///
/// Mirrors what was on the wire: the payload fields plus `type` and `id`.
pub fn response_value(id: u64, mut body: JsonObject) -> Value {
    body.insert("type".to_string(), Value::from("response"));
    body.insert("id".to_string(), Value::from(id));
    Value::Object(body)
}

/// Shallow field-wise merge of `incoming` into `snapshot`.
///
/// Fields present in `incoming` overwrite; fields absent leave the existing
/// snapshot untouched.
pub fn merge_fields(snapshot: &mut JsonObject, incoming: JsonObject) {
    for (key, value) in incoming {
        snapshot.insert(key, value);
    }
}
