// Integration tests for the connection lifecycle
// Tests get-or-create semantics, automatic reconnection, the restart
// notice's longer delay, and explicit shutdown

use crate::helpers::{FakeBridge, request, test_config, wait_for_accepted, wait_for_state};

use bridge_core::client::{BridgeClient, ConnectionState};
use bridge_core::error::client::ClientError;

use std::time::Duration;

use tokio::net::TcpListener;

/// **VALUE**: Verifies connect is get-or-create, never open-another.
///
/// **WHY THIS MATTERS**: Every caller in the application shares one control
/// socket. A second physical connection would split pushed stats and log
/// lines across sockets and double the load on the bridge.
///
/// **BUG THIS CATCHES**: Would catch a connect path that dials
/// unconditionally instead of checking for a live or in-progress connection.
#[tokio::test]
async fn given_live_connection_when_connect_called_again_then_no_second_socket() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());

    client.connect().await.expect("first connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    let state = client.connect().await.expect("second connect");
    assert_eq!(state, ConnectionState::Connected);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bridge.accepted(), 1, "exactly one socket must exist");
}

/// **VALUE**: Verifies an unexpected close is followed by an automatic
/// reconnect after the short delay.
///
/// **WHY THIS MATTERS**: The bridge lives on flaky Wi-Fi; the whole point of
/// the manager is that callers never have to notice a dropped socket.
///
/// **BUG THIS CATCHES**: Would catch reconnection being disabled by an
/// ordinary drop, or the reconnect timer never firing.
#[tokio::test]
async fn given_connection_dropped_when_delay_elapses_then_client_reconnects() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    bridge.close_connections();
    wait_for_accepted(&bridge, 2, Duration::from_secs(2)).await;
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;
}

/// **VALUE**: Verifies a `restarting` notice makes the very next reconnect
/// wait out the longer restart delay.
///
/// **WHY THIS MATTERS**: A rebooting bridge is down for a predictable window.
/// Retrying on the short delay would burn dozens of doomed dials and log
/// noise against a backend known to be away.
///
/// **BUG THIS CATCHES**: Would catch the restart flag being ignored, or not
/// being consumed so every later reconnect also waits the long delay.
#[tokio::test]
async fn given_restart_notice_when_reconnecting_then_longer_delay_used_once() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    bridge.push(r#"{"type":"restarting"}"#);
    wait_for_state(&client, ConnectionState::Connecting, Duration::from_secs(2)).await;

    // Well past the ordinary 50ms delay but short of the 800ms restart delay:
    // no new dial yet.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(bridge.accepted(), 1, "reconnect must wait the restart delay");

    wait_for_accepted(&bridge, 2, Duration::from_secs(2)).await;
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    // The flag is one-shot: a later ordinary drop reconnects on the short
    // delay again.
    bridge.close_connections();
    wait_for_accepted(&bridge, 3, Duration::from_millis(500)).await;
}

/// **VALUE**: Verifies shutdown closes the socket, reports `disconnected`,
/// and stays down.
///
/// **WHY THIS MATTERS**: Shutdown is the only way to stop reconnection. If
/// the manager kept dialing afterwards, the application could never cleanly
/// let go of the bridge.
///
/// **BUG THIS CATCHES**: Would catch the close being treated as an unexpected
/// drop and triggering a reconnect.
#[tokio::test]
async fn given_shutdown_when_called_then_disconnected_and_no_reconnect() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    client.shutdown().await.expect("shutdown");
    assert_eq!(client.state(), ConnectionState::Disconnected);

    // Repeating it is a no-op.
    client.shutdown().await.expect("second shutdown");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(bridge.accepted(), 1, "no reconnect after shutdown");

    let result = client.send_request(request("status")).await;
    assert!(matches!(result, Err(ClientError::NotConnected { .. })));
}

/// **VALUE**: Verifies connect works again after shutdown.
///
/// **WHY THIS MATTERS**: Shutdown ends one connection's lifetime, not the
/// client's. A monitor that reconnects after an operator-requested pause must
/// get a fresh socket.
///
/// **BUG THIS CATCHES**: Would catch shutdown terminating the manager task so
/// later commands hang or fail.
#[tokio::test]
async fn given_shutdown_client_when_connect_called_then_fresh_connection_opens() {
    let bridge = FakeBridge::start().await;
    let client = BridgeClient::new(bridge.config());

    client.connect().await.expect("connect");
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;
    client.shutdown().await.expect("shutdown");

    client.connect().await.expect("reconnect after shutdown");
    wait_for_accepted(&bridge, 2, Duration::from_secs(2)).await;
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(2)).await;

    let response = client.send_request(request("status")).await.expect("request");
    assert_eq!(response.get("ok"), Some(&serde_json::json!(true)));
}

/// **VALUE**: Verifies dial failures are retried until the backend appears.
///
/// **WHY THIS MATTERS**: The monitor is routinely started before the bridge
/// finishes booting; it must keep dialing instead of giving up on the first
/// connection-refused.
///
/// **BUG THIS CATCHES**: Would catch a failed dial leaving the manager stuck
/// in `connecting` with no retry timer armed.
#[tokio::test]
async fn given_backend_down_when_it_comes_up_then_client_connects() {
    // Reserve a port, then free it so the first dials are refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = BridgeClient::new(test_config(&format!("ws://{addr}")));
    client.connect().await.expect("connect");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.state(), ConnectionState::Connecting);

    let bridge = FakeBridge::start_on(addr).await;
    wait_for_state(&client, ConnectionState::Connected, Duration::from_secs(3)).await;
    assert_eq!(bridge.accepted(), 1);
}
