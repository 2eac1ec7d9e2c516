//! Persistent, self-healing connection to the bridge control socket.
//!
//! This module implements the connection manager. It provides:
//!
//! - One WebSocket connection at a time, reopened automatically after drops
//! - A heartbeat sub-protocol that detects half-open connections
//! - Request/response correlation with client-assigned identifiers
//! - Dispatch of pushed stats, log lines, and restart notices to sinks
//!
//! # Architecture
//!
//! A single manager task owns the transport, both timers, and the pending
//! request table (actor pattern). External callers hold a cloneable
//! [`BridgeClient`] and interact only through commands awaiting oneshot
//! replies, so no two event handlers ever run concurrently.
//!
//! # Reconnect policy
//!
//! Ordinary drops reconnect after a short fixed delay. When the bridge
//! pushes a `restarting` notice, the very next reconnect waits out a longer
//! delay instead, so clients do not hammer a backend known to be down for a
//! predictable window. Reconnection stops only on explicit [`shutdown`].
//!
//! [`shutdown`]: BridgeClient::shutdown

mod manager;
pub(crate) mod pending;
mod state;

pub use state::ConnectionState;

use crate::config::BridgeConfig;
use crate::error::client::ClientError;
use crate::protocol::JsonObject;

use common::ErrorLocation;

use std::panic::Location;

use manager::ConnectionManager;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Commands accepted by the manager task.
pub(crate) enum Command {
    /// Get-or-create: ensure a connection exists or is being established.
    Connect {
        reply: oneshot::Sender<ConnectionState>,
    },

    /// Correlated request; resolved when the matching response arrives.
    Request {
        payload: JsonObject,
        reply: oneshot::Sender<Result<Value, ClientError>>,
    },

    /// Shutdown: close the transport and disable reconnection.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Handle to the bridge connection manager.
///
/// Cloneable; all clones talk to the same manager task. The task exits when
/// every handle has been dropped.
#[derive(Clone)]
pub struct BridgeClient {
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    econet_rx: watch::Receiver<JsonObject>,
    aunbridge_rx: watch::Receiver<JsonObject>,
    logs: broadcast::Sender<String>,
}

impl BridgeClient {
    /// Create a client and spawn its manager task.
    ///
    /// No connection is opened until [`connect`](Self::connect) is called.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime (the manager task must be
    /// spawned somewhere).
    pub fn new(config: BridgeConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (econet_tx, econet_rx) = watch::channel(JsonObject::new());
        let (aunbridge_tx, aunbridge_rx) = watch::channel(JsonObject::new());
        let (log_tx, _) = broadcast::channel(config.log_buffer);

        let manager = ConnectionManager::new(
            config,
            command_rx,
            state_tx,
            econet_tx,
            aunbridge_tx,
            log_tx.clone(),
        );
        tokio::spawn(manager.run());

        Self {
            commands: command_tx,
            state_rx,
            econet_rx,
            aunbridge_rx,
            logs: log_tx,
        }
    }

    /// Get-or-create the live connection.
    ///
    /// Idempotent: while a connection exists or is being established this is
    /// a no-op reporting the current state. From `Disconnected` it enables
    /// reconnection and starts dialing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Channel`] if the manager task is gone.
    pub async fn connect(&self) -> Result<ConnectionState, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Connect { reply: reply_tx })
            .await
            .map_err(|_| manager_gone())?;
        reply_rx.await.map_err(|_| manager_gone())
    }

    /// Send a correlated request and await its response.
    ///
    /// The manager injects the next correlation identifier as `id` into the
    /// payload. Resolves with the full decoded response object.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if there is no live connection; the
    ///   request is never queued for a future one.
    /// - [`ClientError::Closed`] if the connection closes before the
    ///   response arrives.
    pub async fn send_request(&self, payload: JsonObject) -> Result<Value, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Request {
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| manager_gone())?;
        reply_rx.await.map_err(|_| manager_gone())?
    }

    /// Close the connection and disable automatic reconnection.
    ///
    /// Idempotent. A later [`connect`](Self::connect) starts over.
    ///
    /// # Errors
    ///
    /// Never fails; a missing manager task means shutdown already happened.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(Command::Shutdown { reply: reply_tx })
            .await
            .is_err()
        {
            return Ok(());
        }
        let _ = reply_rx.await;
        Ok(())
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch connection state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Watch the merged Econet statistics snapshot.
    pub fn watch_econet_stats(&self) -> watch::Receiver<JsonObject> {
        self.econet_rx.clone()
    }

    /// Watch the merged AUN bridge statistics snapshot.
    pub fn watch_aunbridge_stats(&self) -> watch::Receiver<JsonObject> {
        self.aunbridge_rx.clone()
    }

    /// Subscribe to log lines pushed by the bridge.
    pub fn subscribe_logs(&self) -> broadcast::Receiver<String> {
        self.logs.subscribe()
    }
}

#[track_caller]
fn manager_gone() -> ClientError {
    ClientError::Channel {
        message: "Connection manager task is gone".to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}
