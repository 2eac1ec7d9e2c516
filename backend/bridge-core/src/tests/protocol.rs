// Unit tests for the wire protocol module
// Tests inbound decode by type tag, request encoding, and stats merge

use crate::protocol::{
    JsonObject, PING_FRAME, ServerMessage, decode, encode_request, merge_fields, response_value,
};
use serde_json::{Value, json};

fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected JSON object, got {other}"),
    }
}

// ============================================
// UNIT TESTS: Inbound decode
// ============================================

/// **VALUE**: Verifies every inbound message type decodes by its `type` tag.
///
/// **WHY THIS MATTERS**: All dispatch hangs off this decode. If any tag stops
/// matching, the corresponding feature (heartbeat, restart handling, stats,
/// logs, correlation) silently dies because undecodable frames are dropped.
///
/// **BUG THIS CATCHES**: Would catch a renamed variant, a changed tag field,
/// or a serde attribute regression.
#[test]
fn given_tagged_frames_when_decoded_then_each_maps_to_its_variant() {
    assert_eq!(decode(r#"{"type":"pong"}"#).unwrap(), ServerMessage::Pong);
    assert_eq!(
        decode(r#"{"type":"restarting"}"#).unwrap(),
        ServerMessage::Restarting
    );
    assert!(matches!(
        decode(r#"{"type":"log","line":"clock detected"}"#).unwrap(),
        ServerMessage::Log { line } if line == "clock detected"
    ));
}

/// **VALUE**: Verifies `stats_stream` decodes with either, both, or no
/// payload objects present.
///
/// **WHY THIS MATTERS**: The bridge emits whichever stats block changed;
/// both fields are optional on the wire. A decode failure here would drop
/// every stats push.
///
/// **BUG THIS CATCHES**: Would catch a missing `#[serde(default)]` making
/// absent fields a hard error.
#[test]
fn given_stats_stream_when_fields_absent_then_decodes_as_none() {
    let both = decode(r#"{"type":"stats_stream","econet_stats":{"rx":1},"aunbridge_stats":{"tx":2}}"#)
        .unwrap();
    match both {
        ServerMessage::StatsStream {
            econet_stats,
            aunbridge_stats,
        } => {
            assert_eq!(econet_stats.unwrap().get("rx"), Some(&json!(1)));
            assert_eq!(aunbridge_stats.unwrap().get("tx"), Some(&json!(2)));
        }
        other => panic!("Expected StatsStream, got {other:?}"),
    }

    let empty = decode(r#"{"type":"stats_stream"}"#).unwrap();
    match empty {
        ServerMessage::StatsStream {
            econet_stats,
            aunbridge_stats,
        } => {
            assert!(econet_stats.is_none());
            assert!(aunbridge_stats.is_none());
        }
        other => panic!("Expected StatsStream, got {other:?}"),
    }
}

/// **VALUE**: Verifies `response` captures the identifier plus every other
/// payload field.
///
/// **WHY THIS MATTERS**: Responses carry arbitrary caller-defined fields
/// alongside `id`. Correlation needs the id; callers need the rest intact.
///
/// **BUG THIS CATCHES**: Would catch a broken `#[serde(flatten)]` silently
/// discarding payload fields.
#[test]
fn given_response_frame_when_decoded_then_id_and_payload_are_captured() {
    let message = decode(r#"{"type":"response","id":7,"ok":true,"stations":3}"#).unwrap();
    match message {
        ServerMessage::Response { id, body } => {
            assert_eq!(id, 7);
            assert_eq!(body.get("ok"), Some(&json!(true)));
            assert_eq!(body.get("stations"), Some(&json!(3)));
            assert!(body.get("id").is_none(), "id should not duplicate into body");
        }
        other => panic!("Expected Response, got {other:?}"),
    }
}

/// **VALUE**: Verifies malformed and unknown frames return an error instead
/// of panicking.
///
/// **WHY THIS MATTERS**: Dispatch logs and drops undecodable frames; it
/// relies on decode returning `Err`, never aborting.
///
/// **BUG THIS CATCHES**: Would catch decode paths that panic on bad input.
#[test]
fn given_invalid_frames_when_decoded_then_error_returned() {
    assert!(decode("not json at all").is_err());
    assert!(decode(r#"{"type":"martian"}"#).is_err());
    assert!(decode(r#"{"line":"missing tag"}"#).is_err());
    assert!(decode(r#"{"type":"response"}"#).is_err(), "response without id");
}

// ============================================
// UNIT TESTS: Outbound encode
// ============================================

/// **VALUE**: Verifies the correlation identifier is injected into outgoing
/// requests.
///
/// **WHY THIS MATTERS**: The bridge echoes `id` back in its response; without
/// the injection no request could ever resolve.
///
/// **BUG THIS CATCHES**: Would catch the id landing under the wrong key or
/// clobbering caller fields.
#[test]
fn given_payload_when_encoded_then_id_is_injected_alongside_fields() {
    let payload = object(json!({"cmd": "status"}));

    let frame = encode_request(payload, 1).unwrap();
    let on_wire: Value = serde_json::from_str(&frame).unwrap();

    assert_eq!(on_wire.get("cmd"), Some(&json!("status")));
    assert_eq!(on_wire.get("id"), Some(&json!(1)));
}

/// **VALUE**: Verifies the liveness probe frame has the fixed, non-correlated
/// shape the bridge expects.
///
/// **WHY THIS MATTERS**: Probes use the reserved identifier 0 so they never
/// collide with the pending request table.
///
/// **BUG THIS CATCHES**: Would catch an accidental edit to the probe constant.
#[test]
fn given_ping_frame_when_parsed_then_type_ping_with_id_zero() {
    let probe: Value = serde_json::from_str(PING_FRAME).unwrap();
    assert_eq!(probe.get("type"), Some(&json!("ping")));
    assert_eq!(probe.get("id"), Some(&json!(0)));
}

/// **VALUE**: Verifies resolved responses are handed back as the full wire
/// object, tag and identifier included.
///
/// **WHY THIS MATTERS**: Callers see exactly what was on the wire, matching
/// the behavior callers of the control socket already rely on.
///
/// **BUG THIS CATCHES**: Would catch the rebuild dropping the `type` or `id`
/// fields from the resolved value.
#[test]
fn given_response_body_when_rebuilt_then_full_object_returned() {
    let body = object(json!({"ok": true}));

    let value = response_value(5, body);

    assert_eq!(value.get("type"), Some(&json!("response")));
    assert_eq!(value.get("id"), Some(&json!(5)));
    assert_eq!(value.get("ok"), Some(&json!(true)));
}

// ============================================
// UNIT TESTS: Stats merge
// ============================================

/// **VALUE**: Verifies the merge is shallow and field-wise.
///
/// **WHY THIS MATTERS**: The bridge streams incremental stats; fields absent
/// from an update must leave the existing snapshot untouched, and present
/// fields must overwrite.
///
/// **BUG THIS CATCHES**: Would catch a merge that replaces the whole snapshot
/// and thereby loses previously streamed counters.
#[test]
fn given_incremental_updates_when_merged_then_existing_fields_survive() {
    let mut snapshot = object(json!({"rx_frames": 10, "crc_errors": 0}));

    merge_fields(&mut snapshot, object(json!({"rx_frames": 11})));
    assert_eq!(snapshot.get("rx_frames"), Some(&json!(11)));
    assert_eq!(snapshot.get("crc_errors"), Some(&json!(0)));

    merge_fields(&mut snapshot, object(json!({"tx_frames": 4})));
    assert_eq!(snapshot.get("rx_frames"), Some(&json!(11)));
    assert_eq!(snapshot.get("tx_frames"), Some(&json!(4)));
    assert_eq!(snapshot.get("crc_errors"), Some(&json!(0)));
}
