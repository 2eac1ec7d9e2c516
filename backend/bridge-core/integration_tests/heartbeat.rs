// Integration tests for the liveness sub-protocol
// Tests probe emission, pong-refreshed liveness, and half-open detection

use crate::helpers::{FakeBridge, test_config, wait_for_accepted, wait_for_state};

use bridge_core::client::{BridgeClient, ConnectionState};

use std::time::Duration;

use serde_json::Value;

/// **VALUE**: Verifies the client emits `ping` probes with the reserved
/// identifier 0 at the configured interval.
///
/// **WHY THIS MATTERS**: The bridge only answers probes it receives; a client
/// that never probes can never detect a half-open connection.
///
/// **BUG THIS CATCHES**: Would catch the probe timer not being armed on
/// connect, or the probe frame losing its fixed shape.
#[tokio::test]
async fn given_live_connection_when_interval_elapses_then_probe_sent() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());
    let mut frames = bridge.observe_frames();

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    let probe = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let frame = frames.recv().await.expect("frame stream closed");
            if frame.get("type").and_then(Value::as_str) == Some("ping") {
                return frame;
            }
        }
    })
    .await
    .expect("no probe within two seconds");

    assert_eq!(probe.get("id"), Some(&serde_json::json!(0)));
}

/// **VALUE**: Verifies a connection whose probes are acknowledged stays up
/// across many liveness windows.
///
/// **WHY THIS MATTERS**: The liveness check must only fire on genuinely dead
/// connections. Tearing down a healthy socket is worse than the half-open
/// condition it guards against.
///
/// **BUG THIS CATCHES**: Would catch `pong` frames failing to refresh the
/// liveness clock, which would reconnect every healthy session on a period.
#[tokio::test]
async fn given_pongs_arriving_when_windows_elapse_then_connection_stays_up() {
    let bridge = FakeBridge::start().await;
    let mut config = test_config(&bridge.url());
    config.ping_interval_ms = 50;
    config.pong_timeout_ms = 150;
    let client = BridgeClient::new(config);

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    // Several full liveness windows with pongs flowing.
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(bridge.accepted(), 1, "healthy connection must not be recycled");
}

/// **VALUE**: Verifies a connection that stops acknowledging probes is torn
/// down and redialed.
///
/// **WHY THIS MATTERS**: A Wi-Fi bridge that drops off the network leaves the
/// TCP socket half-open; without the timeout the client would wait on a dead
/// transport forever, with every request hanging.
///
/// **BUG THIS CATCHES**: Would catch the timeout check never firing, or
/// firing without triggering the reconnect path.
#[tokio::test]
async fn given_pongs_missing_when_timeout_expires_then_client_redials() {
    let bridge = FakeBridge::start().await;
    let mut config = test_config(&bridge.url());
    config.ping_interval_ms = 50;
    config.pong_timeout_ms = 150;
    let client = BridgeClient::new(config);
    bridge.set_respond_pongs(false);

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    // No pongs: the liveness window expires and the client dials again.
    wait_for_accepted(&bridge, 2, Duration::from_secs(2)).await;
}
