// Integration tests for push-message dispatch
// Tests stats merging into the watch sinks, log line fan-out, and
// resilience to undecodable frames

use crate::helpers::{FakeBridge, request, wait_for_field, wait_for_state};

use bridge_core::client::{BridgeClient, ConnectionState};

use std::time::Duration;

use serde_json::json;

/// **VALUE**: Verifies streamed stats merge field-wise into the snapshot.
///
/// **WHY THIS MATTERS**: The bridge streams only the counters that changed.
/// A consumer reading the snapshot must see the union of everything streamed
/// so far, with newer values winning.
///
/// **BUG THIS CATCHES**: Would catch an update replacing the whole snapshot
/// and losing counters from earlier pushes.
#[tokio::test]
async fn given_incremental_stats_when_pushed_then_snapshot_accumulates() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());
    let mut econet = client.watch_econet_stats();

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    bridge.push(r#"{"type":"stats_stream","econet_stats":{"rx_frames":10,"crc_errors":0}}"#);
    wait_for_field(&mut econet, "rx_frames", Duration::from_secs(2)).await;

    bridge.push(r#"{"type":"stats_stream","econet_stats":{"tx_frames":4,"rx_frames":11}}"#);
    wait_for_field(&mut econet, "tx_frames", Duration::from_secs(2)).await;

    let snapshot = econet.borrow().clone();
    assert_eq!(snapshot.get("rx_frames"), Some(&json!(11)));
    assert_eq!(snapshot.get("tx_frames"), Some(&json!(4)));
    assert_eq!(snapshot.get("crc_errors"), Some(&json!(0)));
}

/// **VALUE**: Verifies the two stats blocks land in their own sinks.
///
/// **WHY THIS MATTERS**: Econet link counters and AUN bridge counters are
/// separate surfaces in the monitor; cross-contamination would render both
/// meaningless.
///
/// **BUG THIS CATCHES**: Would catch a dispatch wiring both payloads into the
/// same watch channel.
#[tokio::test]
async fn given_both_stats_blocks_when_pushed_then_each_sink_gets_its_own() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());
    let mut econet = client.watch_econet_stats();
    let mut aunbridge = client.watch_aunbridge_stats();

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    bridge.push(
        r#"{"type":"stats_stream","econet_stats":{"rx_frames":1},"aunbridge_stats":{"udp_tx":7}}"#,
    );

    let rx_frames = wait_for_field(&mut econet, "rx_frames", Duration::from_secs(2)).await;
    let udp_tx = wait_for_field(&mut aunbridge, "udp_tx", Duration::from_secs(2)).await;

    assert_eq!(rx_frames, json!(1));
    assert_eq!(udp_tx, json!(7));
    assert!(econet.borrow().get("udp_tx").is_none());
    assert!(aunbridge.borrow().get("rx_frames").is_none());
}

/// **VALUE**: Verifies pushed log lines reach subscribers.
///
/// **WHY THIS MATTERS**: The live log feed is the operator's main diagnostic
/// view of the bridge; a dropped line here is a dropped clue there.
///
/// **BUG THIS CATCHES**: Would catch `log` frames being decoded but never
/// forwarded to the broadcast channel.
#[tokio::test]
async fn given_log_frame_when_pushed_then_subscriber_receives_line() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());
    let mut logs = client.subscribe_logs();

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    bridge.push(r#"{"type":"log","line":"clock detected at 200kHz"}"#);

    let line = tokio::time::timeout(Duration::from_secs(2), logs.recv())
        .await
        .expect("no log line within two seconds")
        .expect("log channel closed");
    assert_eq!(line, "clock detected at 200kHz");
}

/// **VALUE**: Verifies an undecodable frame is dropped without harming the
/// connection.
///
/// **WHY THIS MATTERS**: The bridge firmware evolves independently of the
/// monitor; an unknown or garbled frame must cost one log line, not the
/// connection.
///
/// **BUG THIS CATCHES**: Would catch a decode error propagating into the
/// connection-lost path.
#[tokio::test]
async fn given_undecodable_frames_when_received_then_connection_survives() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    bridge.push(r#"{"type":"martian","x":1}"#);
    bridge.push("not json at all");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(bridge.accepted(), 1);

    let response = client.send_request(request("status")).await.expect("request");
    assert_eq!(response.get("ok"), Some(&json!(true)));
}
