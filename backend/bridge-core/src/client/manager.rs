//! The connection manager task.
//!
//! Owns the single transport handle, the reconnect policy, the heartbeat
//! timer, and the pending request table. Runs as one task; all work happens
//! on delivery of a command, a transport event, or a timer firing.
//!
//! State machine: `disconnected → connecting → connected → (closed) →
//! connecting → …`, with `disconnected` reached again only through explicit
//! shutdown.

use super::Command;
use super::pending::{PendingRequests, ReplySlot};
use super::state::ConnectionState;
use crate::config::BridgeConfig;
use crate::error::client::ClientError;
use crate::protocol::{self, JsonObject, PING_FRAME, ServerMessage};

use common::ErrorLocation;

use std::panic::Location;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, interval_at, sleep_until};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outcome of dispatching one inbound frame.
enum Dispatch {
    Continue,
    CloseTransport,
}

pub(crate) struct ConnectionManager {
    config: BridgeConfig,
    commands: mpsc::Receiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    econet_tx: watch::Sender<JsonObject>,
    aunbridge_tx: watch::Sender<JsonObject>,
    log_tx: broadcast::Sender<String>,
    pending: PendingRequests,

    /// Cleared only by explicit shutdown.
    reconnect_enabled: bool,

    /// One-shot: the very next scheduled reconnect uses the long restart
    /// delay, then the flag is consumed.
    restart_pending: bool,

    /// Deadline of the single scheduled reconnect, if any.
    reconnect_at: Option<Instant>,

    /// Instant of the last received liveness acknowledgment.
    last_pong: Instant,

    /// Set false when every client handle is gone.
    running: bool,
}

impl ConnectionManager {
    pub(crate) fn new(
        config: BridgeConfig,
        commands: mpsc::Receiver<Command>,
        state_tx: watch::Sender<ConnectionState>,
        econet_tx: watch::Sender<JsonObject>,
        aunbridge_tx: watch::Sender<JsonObject>,
        log_tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            config,
            commands,
            state_tx,
            econet_tx,
            aunbridge_tx,
            log_tx,
            pending: PendingRequests::new(),
            reconnect_enabled: false,
            restart_pending: false,
            reconnect_at: None,
            last_pong: Instant::now(),
            running: true,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Bridge connection manager started");

        while self.running {
            if self.state() == ConnectionState::Disconnected {
                self.offline().await;
            } else if let Some(transport) = self.establish().await {
                self.online(transport).await;
            }
        }

        debug!("Bridge connection manager stopped");
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!("Connection state: {current} -> {state}");
                *current = state;
                true
            }
        });
    }

    /// Disconnected: wait for a connect request.
    async fn offline(&mut self) {
        match self.commands.recv().await {
            Some(Command::Connect { reply }) => {
                self.reconnect_enabled = true;
                self.restart_pending = false;
                self.set_state(ConnectionState::Connecting);
                let _ = reply.send(ConnectionState::Connecting);
            }
            Some(Command::Request { reply, .. }) => {
                let _ = reply.send(Err(not_connected()));
            }
            Some(Command::Shutdown { reply }) => {
                // Already disconnected; shutdown is idempotent.
                let _ = reply.send(());
            }
            None => self.running = false,
        }
    }

    /// Connecting: wait out any scheduled reconnect, then dial.
    ///
    /// Returns the open transport, or `None` if the dial failed (a retry is
    /// scheduled) or shutdown intervened.
    async fn establish(&mut self) -> Option<Transport> {
        while let Some(deadline) = self.reconnect_at {
            tokio::select! {
                _ = sleep_until(deadline) => {
                    self.reconnect_at = None;
                }
                cmd = self.commands.recv() => {
                    if !self.handle_offline_command(cmd) {
                        return None;
                    }
                }
            }
        }

        info!("Dialing bridge at {}", self.config.endpoint);
        let endpoint = self.config.endpoint.clone();
        let dial = connect_async(endpoint);
        tokio::pin!(dial);

        loop {
            tokio::select! {
                result = &mut dial => {
                    return match result {
                        Ok((transport, _)) => {
                            info!("Bridge connection established");
                            self.last_pong = Instant::now();
                            self.set_state(ConnectionState::Connected);
                            Some(transport)
                        }
                        Err(e) => {
                            warn!("Bridge dial failed: {e}");
                            self.schedule_reconnect();
                            None
                        }
                    };
                }
                cmd = self.commands.recv() => {
                    if !self.handle_offline_command(cmd) {
                        return None;
                    }
                }
            }
        }
    }

    /// Handle a command that arrives while no connection is live.
    ///
    /// Returns `false` when establishing must stop (shutdown or all handles
    /// dropped).
    fn handle_offline_command(&mut self, cmd: Option<Command>) -> bool {
        match cmd {
            Some(Command::Connect { reply }) => {
                // Idempotent: an attempt is already underway.
                let _ = reply.send(self.state());
                true
            }
            Some(Command::Request { reply, .. }) => {
                let _ = reply.send(Err(not_connected()));
                true
            }
            Some(Command::Shutdown { reply }) => {
                self.do_shutdown();
                let _ = reply.send(());
                false
            }
            None => {
                self.do_shutdown();
                self.running = false;
                false
            }
        }
    }

    /// Connected: pump commands, inbound frames, and the heartbeat timer
    /// until the connection ends one way or another.
    async fn online(&mut self, mut transport: Transport) {
        let period = self.config.ping_interval();
        let mut probe = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(Command::Connect { reply }) => {
                            let _ = reply.send(ConnectionState::Connected);
                        }
                        Some(Command::Request { payload, reply }) => {
                            if let Err(e) = self.transmit_request(&mut transport, payload, reply).await {
                                warn!("Request transmit failed: {e}");
                                self.connection_lost(&mut transport).await;
                                return;
                            }
                        }
                        Some(Command::Shutdown { reply }) => {
                            let _ = transport.close(None).await;
                            self.do_shutdown();
                            let _ = reply.send(());
                            return;
                        }
                        None => {
                            let _ = transport.close(None).await;
                            self.do_shutdown();
                            self.running = false;
                            return;
                        }
                    }
                }
                frame = transport.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Dispatch::CloseTransport = self.dispatch(text.as_str()) {
                                self.connection_lost(&mut transport).await;
                                return;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Bridge connection closed by peer");
                            self.connection_lost(&mut transport).await;
                            return;
                        }
                        Some(Ok(_)) => {
                            // Binary and control frames are not part of the protocol.
                        }
                        Some(Err(e)) => {
                            warn!("Bridge transport error: {e}");
                            self.connection_lost(&mut transport).await;
                            return;
                        }
                    }
                }
                _ = probe.tick() => {
                    if self.last_pong.elapsed() > self.config.pong_timeout() {
                        warn!(
                            "No pong for {:?}, presuming connection dead",
                            self.last_pong.elapsed()
                        );
                        self.connection_lost(&mut transport).await;
                        return;
                    }
                    if let Err(e) = transport.send(Message::text(PING_FRAME)).await {
                        warn!("Liveness probe failed: {e}");
                        self.connection_lost(&mut transport).await;
                        return;
                    }
                }
            }
        }
    }

    /// Assign an identifier, record the reply slot, and transmit the frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Send`] if the transport write fails; the caller
    /// then tears the connection down, which fails this request along with
    /// every other pending one.
    async fn transmit_request(
        &mut self,
        transport: &mut Transport,
        payload: JsonObject,
        reply: ReplySlot,
    ) -> Result<(), ClientError> {
        let id = self.pending.register(reply);

        let frame = match protocol::encode_request(payload, id) {
            Ok(frame) => frame,
            Err(e) => {
                self.pending.reject(
                    id,
                    ClientError::Encode {
                        message: format!("Failed to encode request: {e}"),
                        location: ErrorLocation::from(Location::caller()),
                    },
                );
                return Ok(());
            }
        };

        debug!("Sending request {id}");
        transport
            .send(Message::text(frame))
            .await
            .map_err(|e| ClientError::Send {
                message: format!("Failed to send request {id}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Dispatch one decoded inbound frame by its `type` tag.
    fn dispatch(&mut self, frame: &str) -> Dispatch {
        let message = match protocol::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping undecodable frame: {e}");
                return Dispatch::Continue;
            }
        };

        match message {
            ServerMessage::Pong => {
                self.last_pong = Instant::now();
                Dispatch::Continue
            }
            ServerMessage::Restarting => {
                info!("Bridge announced restart; next reconnect uses the long delay");
                self.restart_pending = true;
                self.set_state(ConnectionState::Connecting);
                Dispatch::CloseTransport
            }
            ServerMessage::StatsStream {
                econet_stats,
                aunbridge_stats,
            } => {
                if let Some(fields) = econet_stats {
                    self.econet_tx
                        .send_modify(|snapshot| protocol::merge_fields(snapshot, fields));
                }
                if let Some(fields) = aunbridge_stats {
                    self.aunbridge_tx
                        .send_modify(|snapshot| protocol::merge_fields(snapshot, fields));
                }
                Dispatch::Continue
            }
            ServerMessage::Log { line } => {
                // No subscribers is fine; the line is simply dropped.
                let _ = self.log_tx.send(line);
                Dispatch::Continue
            }
            ServerMessage::Response { id, body } => {
                if self.pending.resolve(id, protocol::response_value(id, body)) {
                    debug!("Resolved request {id}");
                } else {
                    debug!("Response for unknown request id {id}, dropping");
                }
                Dispatch::Continue
            }
        }
    }

    /// Ordinary close path: fail pending requests and schedule a reconnect
    /// (unless reconnection has been disabled).
    async fn connection_lost(&mut self, transport: &mut Transport) {
        let _ = transport.close(None).await;

        let outstanding = self.pending.len();
        if outstanding > 0 {
            debug!("Failing {outstanding} pending requests");
        }
        self.pending.fail_all("Connection closed before response arrived");

        if self.reconnect_enabled {
            self.set_state(ConnectionState::Connecting);
            self.schedule_reconnect();
        } else {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Schedule the single reconnect timer. A no-op while one is pending.
    ///
    /// Consumes the one-shot restart flag to pick the long delay; ordinary
    /// drops use the short delay.
    fn schedule_reconnect(&mut self) {
        if self.reconnect_at.is_some() {
            return;
        }

        let delay = if self.restart_pending {
            self.restart_pending = false;
            self.config.restart_delay()
        } else {
            self.config.reconnect_delay()
        };

        debug!("Reconnect scheduled in {delay:?}");
        self.reconnect_at = Some(Instant::now() + delay);
    }

    /// Disable reconnection, cancel timers, fail pending requests.
    fn do_shutdown(&mut self) {
        info!("Bridge connection shut down");
        self.reconnect_enabled = false;
        self.restart_pending = false;
        self.reconnect_at = None;
        self.pending.fail_all("Connection closed by shutdown");
        self.set_state(ConnectionState::Disconnected);
    }
}

#[track_caller]
fn not_connected() -> ClientError {
    ClientError::NotConnected {
        message: "No live bridge connection; request not queued".to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}
