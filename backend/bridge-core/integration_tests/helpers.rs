//! Test helpers for the connection manager integration tests.
//!
//! Provides a scriptable in-process bridge backend:
//! - Accepts WebSocket connections and counts them
//! - Answers `ping` probes with `pong` (switchable off to simulate a
//!   half-open connection)
//! - Echoes correlated requests as `response` frames (switchable off so a
//!   test can script responses by hand)
//! - Lets tests push arbitrary frames and force-close live connections
//! - Publishes every JSON frame it reads, for wire-shape assertions

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bridge_core::client::{BridgeClient, ConnectionState};
use bridge_core::config::BridgeConfig;
use bridge_core::protocol::JsonObject;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Commands a test can issue against the fake bridge's live connections.
#[derive(Debug, Clone)]
pub enum BackendCommand {
    /// Push a raw text frame to every live connection.
    Send(String),
    /// Close every live connection.
    Close,
}

pub struct FakeBridge {
    addr: SocketAddr,
    commands: broadcast::Sender<BackendCommand>,
    accepted: Arc<AtomicUsize>,
    respond_pongs: Arc<AtomicBool>,
    auto_respond: Arc<AtomicBool>,
    received: broadcast::Sender<Value>,
}

impl FakeBridge {
    /// Start a fake bridge on an ephemeral localhost port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake bridge");
        Self::serve(listener).await
    }

    /// Start a fake bridge on a specific address (for dial-retry tests that
    /// bring the backend up after the client has started dialing).
    pub async fn start_on(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr)
            .await
            .expect("Failed to bind fake bridge on fixed address");
        Self::serve(listener).await
    }

    async fn serve(listener: TcpListener) -> Self {
        let addr = listener.local_addr().expect("Failed to read local addr");
        let (commands, _) = broadcast::channel(64);
        let (received, _) = broadcast::channel(64);
        let accepted = Arc::new(AtomicUsize::new(0));
        let respond_pongs = Arc::new(AtomicBool::new(true));
        let auto_respond = Arc::new(AtomicBool::new(true));

        let bridge = Self {
            addr,
            commands: commands.clone(),
            accepted: Arc::clone(&accepted),
            respond_pongs: Arc::clone(&respond_pongs),
            auto_respond: Arc::clone(&auto_respond),
            received: received.clone(),
        };

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handle_connection(
                    stream,
                    commands.subscribe(),
                    Arc::clone(&respond_pongs),
                    Arc::clone(&auto_respond),
                    received.clone(),
                ));
            }
        });

        bridge
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Config pointed at this fake bridge with test-friendly timings.
    ///
    /// The pong timeout is generous so the heartbeat never interferes unless
    /// a test tightens it deliberately.
    pub fn config(&self) -> BridgeConfig {
        let mut config = test_config(&self.url());
        config.validate().expect("test config must validate");
        config
    }

    /// Number of connections accepted so far (across reconnects).
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Push a raw frame to every live connection.
    pub fn push(&self, frame: &str) {
        let _ = self.commands.send(BackendCommand::Send(frame.to_string()));
    }

    /// Close every live connection.
    pub fn close_connections(&self) {
        let _ = self.commands.send(BackendCommand::Close);
    }

    /// Stop answering liveness probes, simulating a half-open connection.
    pub fn set_respond_pongs(&self, on: bool) {
        self.respond_pongs.store(on, Ordering::SeqCst);
    }

    /// Stop echoing requests, so a test can script responses by hand.
    pub fn set_auto_respond(&self, on: bool) {
        self.auto_respond.store(on, Ordering::SeqCst);
    }

    /// Subscribe to every JSON frame the backend reads off the wire.
    pub fn observe_frames(&self) -> broadcast::Receiver<Value> {
        self.received.subscribe()
    }
}

async fn handle_connection(
    stream: TcpStream,
    mut commands: broadcast::Receiver<BackendCommand>,
    respond_pongs: Arc<AtomicBool>,
    auto_respond: Arc<AtomicBool>,
    received: broadcast::Sender<Value>,
) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };

    loop {
        tokio::select! {
            frame = ws.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let value: Value = match serde_json::from_str(text.as_str()) {
                    Ok(value) => value,
                    Err(_) => continue,
                };
                let _ = received.send(value.clone());

                if value.get("type").and_then(Value::as_str) == Some("ping") {
                    if respond_pongs.load(Ordering::SeqCst)
                        && ws.send(Message::text(r#"{"type":"pong"}"#)).await.is_err()
                    {
                        break;
                    }
                    continue;
                }

                if auto_respond.load(Ordering::SeqCst) {
                    if let Some(id) = value.get("id").and_then(Value::as_u64) {
                        let response = format!(r#"{{"type":"response","id":{id},"ok":true}}"#);
                        if ws.send(Message::text(response)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Ok(BackendCommand::Send(frame)) => {
                        if ws.send(Message::text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Ok(BackendCommand::Close) => {
                        let _ = ws.close(None).await;
                        break;
                    }
                    Err(_) => break,
                }
            }
        }
    }
}

/// Test-friendly config for an arbitrary endpoint.
pub fn test_config(endpoint: &str) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.endpoint = endpoint.to_string();
    config.reconnect_delay_ms = 50;
    config.restart_delay_ms = 800;
    config.ping_interval_ms = 50;
    config.pong_timeout_ms = 60_000;
    config.log_buffer = 64;
    config
}

/// Build a request payload carrying a single `cmd` field.
pub fn request(cmd: &str) -> JsonObject {
    let mut payload = JsonObject::new();
    payload.insert("cmd".to_string(), Value::from(cmd));
    payload
}

/// Wait until the client reports the target connection state.
pub async fn wait_for_state(client: &BridgeClient, target: ConnectionState, timeout: Duration) {
    let mut rx = client.watch_state();
    tokio::time::timeout(timeout, async {
        loop {
            if *rx.borrow_and_update() == target {
                return;
            }
            rx.changed()
                .await
                .expect("Manager gone while waiting for state");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for state {target}"));
}

/// Wait until the fake bridge has accepted at least `at_least` connections.
pub async fn wait_for_accepted(bridge: &FakeBridge, at_least: usize, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        while bridge.accepted() < at_least {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "Timed out waiting for {at_least} connections (got {})",
            bridge.accepted()
        )
    });
}

/// Wait for the next non-probe frame the backend reads.
pub async fn next_request_frame(rx: &mut broadcast::Receiver<Value>, timeout: Duration) -> Value {
    tokio::time::timeout(timeout, async {
        loop {
            let frame = rx.recv().await.expect("Fake bridge frame stream closed");
            if frame.get("type").and_then(Value::as_str) != Some("ping") {
                return frame;
            }
        }
    })
    .await
    .expect("Timed out waiting for a request frame")
}

/// Wait until a stats watch snapshot carries the given field.
pub async fn wait_for_field(
    rx: &mut watch::Receiver<JsonObject>,
    key: &str,
    timeout: Duration,
) -> Value {
    tokio::time::timeout(timeout, async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if let Some(value) = snapshot.get(key) {
                    return value.clone();
                }
            }
            rx.changed()
                .await
                .expect("Manager gone while waiting for stats");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for stats field {key}"))
}
