use bridge_monitor::error::MonitorError;
use bridge_monitor::logger::initialize as logger_initialize;

use bridge_core::protocol::JsonObject;
use bridge_core::{BridgeClient, BridgeConfig, ConnectionState};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;

use log::{info, warn};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

/// Config file consulted when no path is given on the command line.
const DEFAULT_CONFIG_FILE: &str = "bridge-monitor.json";

#[tokio::main]
async fn main() -> Result<(), MonitorError> {
    // Logs live under the system temp directory; the monitor has no
    // installation footprint.
    let log_dir = std::env::temp_dir().join("bridge-monitor");
    create_dir_all(&log_dir).map_err(|e| MonitorError::Monitor {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    logger_initialize(&log_dir)?;

    info!("Bridge monitor starting");
    info!("Log directory: {}", log_dir.display());

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = BridgeConfig::load(&config_path).map_err(|e| MonitorError::Monitor {
        message: format!("Failed to load configuration: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!("Bridge endpoint: {}", config.endpoint);

    let client = BridgeClient::new(config);
    client.connect().await.map_err(|e| MonitorError::Monitor {
        message: format!("Failed to start connection: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Query the bridge once the connection is up.
    let status_client = client.clone();
    tokio::spawn(async move {
        let mut state_rx = status_client.watch_state();
        loop {
            if *state_rx.borrow_and_update() == ConnectionState::Connected {
                break;
            }
            if state_rx.changed().await.is_err() {
                return;
            }
        }

        let mut payload = JsonObject::new();
        payload.insert("cmd".to_string(), Value::from("status"));
        match status_client.send_request(payload).await {
            Ok(response) => info!("Bridge status: {response}"),
            Err(error) => warn!("Status request failed: {error}"),
        }
    });

    run_monitor(&client).await;

    if client.shutdown().await.is_err() {
        warn!("Shutdown command failed");
    }
    info!("Bridge monitor stopped");

    Ok(())
}

/// Log state transitions, stats snapshots, and bridge log lines until
/// interrupted.
async fn run_monitor(client: &BridgeClient) {
    let mut state_rx = client.watch_state();
    let mut econet_rx = client.watch_econet_stats();
    let mut aunbridge_rx = client.watch_aunbridge_stats();
    let mut bridge_logs = client.subscribe_logs();

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                info!("Connection state: {}", *state_rx.borrow_and_update());
            }
            changed = econet_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = econet_rx.borrow_and_update().clone();
                info!("Econet stats: {}", Value::Object(snapshot));
            }
            changed = aunbridge_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = aunbridge_rx.borrow_and_update().clone();
                info!("AUN bridge stats: {}", Value::Object(snapshot));
            }
            line = bridge_logs.recv() => {
                match line {
                    Ok(line) => info!("bridge: {line}"),
                    Err(RecvError::Lagged(missed)) => warn!("Dropped {missed} bridge log lines"),
                    Err(RecvError::Closed) => break,
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!("Failed to listen for interrupt: {error}");
                }
                break;
            }
        }
    }
}
