// Integration tests for request/response correlation
// Tests identifier assignment on the wire, out-of-order resolution,
// stray responses, and failure of in-flight requests on disconnect

use crate::helpers::{
    FakeBridge, next_request_frame, request, wait_for_accepted, wait_for_state,
};

use bridge_core::client::{BridgeClient, ConnectionState};
use bridge_core::error::client::ClientError;

use std::time::Duration;

use serde_json::json;

/// **VALUE**: Verifies the first request carries `id` 1 on the wire and
/// resolves with the full response object.
///
/// **WHY THIS MATTERS**: Identifier 0 is reserved for liveness probes; the
/// bridge treats anything else as correlatable. Callers receive the complete
/// decoded frame, tag and identifier included.
///
/// **BUG THIS CATCHES**: Would catch the counter starting at 0 and colliding
/// with probes, or the resolved value dropping wire fields.
#[tokio::test]
async fn given_first_request_when_sent_then_id_one_on_wire_and_full_response() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());
    let mut frames = bridge.observe_frames();

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    let response = client.send_request(request("status")).await.expect("request");

    let frame = next_request_frame(&mut frames, Duration::from_secs(2)).await;
    assert_eq!(frame.get("id"), Some(&json!(1)));
    assert_eq!(frame.get("cmd"), Some(&json!("status")));

    assert_eq!(response.get("type"), Some(&json!("response")));
    assert_eq!(response.get("id"), Some(&json!(1)));
    assert_eq!(response.get("ok"), Some(&json!(true)));
}

/// **VALUE**: Verifies responses arriving out of order each resolve their own
/// caller.
///
/// **WHY THIS MATTERS**: The bridge answers cheap queries before expensive
/// ones. Correlation by identifier, not arrival order, is the entire contract
/// of the request path.
///
/// **BUG THIS CATCHES**: Would catch a FIFO assumption handing the second
/// caller the first caller's response.
#[tokio::test]
async fn given_out_of_order_responses_when_resolved_then_each_caller_gets_its_own() {
    let bridge = FakeBridge::start().await;
    bridge.set_auto_respond(false);
    let client = BridgeClient::new(bridge.config());
    let mut frames = bridge.observe_frames();

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.send_request(request("slow")).await })
    };
    let first_frame = next_request_frame(&mut frames, Duration::from_secs(2)).await;

    let second = {
        let client = client.clone();
        tokio::spawn(async move { client.send_request(request("fast")).await })
    };
    let second_frame = next_request_frame(&mut frames, Duration::from_secs(2)).await;

    let first_id = first_frame.get("id").and_then(|v| v.as_u64()).expect("id");
    let second_id = second_frame.get("id").and_then(|v| v.as_u64()).expect("id");
    assert_eq!(first_id, 1);
    assert_eq!(second_id, 2);

    // Answer in reverse order.
    bridge.push(&format!(r#"{{"type":"response","id":{second_id},"echo":"fast"}}"#));
    bridge.push(&format!(r#"{{"type":"response","id":{first_id},"echo":"slow"}}"#));

    let first_response = first.await.expect("join").expect("resolve");
    let second_response = second.await.expect("join").expect("resolve");

    assert_eq!(first_response.get("echo"), Some(&json!("slow")));
    assert_eq!(first_response.get("id"), Some(&json!(first_id)));
    assert_eq!(second_response.get("echo"), Some(&json!("fast")));
    assert_eq!(second_response.get("id"), Some(&json!(second_id)));
}

/// **VALUE**: Verifies a response with an unknown identifier is dropped
/// without disturbing the connection or later requests.
///
/// **WHY THIS MATTERS**: Responses to requests from before a reconnect can
/// straggle in; they must be ignored, not crash dispatch or resolve a fresh
/// request.
///
/// **BUG THIS CATCHES**: Would catch stray responses tearing down the
/// connection or being mis-delivered.
#[tokio::test]
async fn given_unknown_response_id_when_received_then_ignored() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    bridge.push(r#"{"type":"response","id":99,"stale":true}"#);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.state(), ConnectionState::Connected);

    let response = client.send_request(request("status")).await.expect("request");
    assert_eq!(response.get("id"), Some(&json!(1)));
    assert!(response.get("stale").is_none());
}

/// **VALUE**: Verifies every in-flight request fails with a closed-connection
/// error when the socket drops.
///
/// **WHY THIS MATTERS**: Requests are never silently retried on the next
/// connection; the caller decides. A leaked pending entry would hang its
/// caller forever.
///
/// **BUG THIS CATCHES**: Would catch the disconnect path forgetting to drain
/// the pending table.
#[tokio::test]
async fn given_in_flight_requests_when_connection_drops_then_all_fail_closed() {
    let bridge = FakeBridge::start().await;
    bridge.set_auto_respond(false);
    let client = BridgeClient::new(bridge.config());
    let mut frames = bridge.observe_frames();

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.send_request(request("one")).await })
    };
    next_request_frame(&mut frames, Duration::from_secs(2)).await;
    let second = {
        let client = client.clone();
        tokio::spawn(async move { client.send_request(request("two")).await })
    };
    next_request_frame(&mut frames, Duration::from_secs(2)).await;

    bridge.close_connections();

    let first_result = first.await.expect("join");
    let second_result = second.await.expect("join");
    assert!(matches!(first_result, Err(ClientError::Closed { .. })));
    assert!(matches!(second_result, Err(ClientError::Closed { .. })));
}

/// **VALUE**: Verifies requests are refused, not queued, while disconnected.
///
/// **WHY THIS MATTERS**: A queued request would fire against whatever
/// connection appears later, possibly minutes on, against a rebooted bridge
/// in a different state.
///
/// **BUG THIS CATCHES**: Would catch the request path buffering payloads
/// while no transport exists.
#[tokio::test]
async fn given_no_connection_when_request_sent_then_not_connected_error() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());

    let result = client.send_request(request("status")).await;

    assert!(matches!(result, Err(ClientError::NotConnected { .. })));
    assert_eq!(bridge.accepted(), 0, "a refused request must not dial");
}

/// **VALUE**: Verifies correlation identifiers keep increasing across a
/// reconnect.
///
/// **WHY THIS MATTERS**: The counter is client-lifetime. Restarting it per
/// connection would let a straggling response from the old socket collide
/// with a fresh request on the new one.
///
/// **BUG THIS CATCHES**: Would catch the counter being reset when a new
/// transport is established.
#[tokio::test]
async fn given_reconnect_when_next_request_sent_then_ids_continue() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());
    let mut frames = bridge.observe_frames();

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    client.send_request(request("status")).await.expect("first request");
    let first_frame = next_request_frame(&mut frames, Duration::from_secs(2)).await;
    assert_eq!(first_frame.get("id"), Some(&json!(1)));

    bridge.close_connections();
    wait_for_accepted(&bridge, 2, Duration::from_secs(2)).await;
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    client.send_request(request("status")).await.expect("second request");
    let second_frame = next_request_frame(&mut frames, Duration::from_secs(2)).await;
    assert_eq!(second_frame.get("id"), Some(&json!(2)));
}
