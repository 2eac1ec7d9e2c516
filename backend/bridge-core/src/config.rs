//! Client configuration for the bridge connection.
//!
//! Loaded from a JSON file when one is present, otherwise defaults apply.
//! All timers are expressed in milliseconds in the file and exposed as
//! [`Duration`] accessors to the rest of the crate.

use crate::BRIDGE_WS_URL;
use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};
use url::Url;

/// Delay before reconnecting after an ordinary connection drop.
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

/// Delay before reconnecting after the bridge announced a deliberate restart.
const DEFAULT_RESTART_DELAY_MS: u64 = 5_000;

/// Interval between liveness probes while connected.
const DEFAULT_PING_INTERVAL_MS: u64 = 5_000;

/// Silence window after which the connection is presumed dead.
const DEFAULT_PONG_TIMEOUT_MS: u64 = 12_000;

/// Capacity of the pushed-log-line broadcast channel.
const DEFAULT_LOG_BUFFER: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// WebSocket endpoint of the bridge control socket (`ws://` or `wss://`).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,

    #[serde(default = "default_log_buffer")]
    pub log_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            restart_delay_ms: default_restart_delay_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            pong_timeout_ms: default_pong_timeout_ms(),
            log_buffer: default_log_buffer(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_endpoint() -> String {
    BRIDGE_WS_URL.to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}
fn default_restart_delay_ms() -> u64 {
    DEFAULT_RESTART_DELAY_MS
}
fn default_ping_interval_ms() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}
fn default_pong_timeout_ms() -> u64 {
    DEFAULT_PONG_TIMEOUT_MS
}
fn default_log_buffer() -> usize {
    DEFAULT_LOG_BUFFER
}

// ============================================
// IMPLEMENTATION
// ============================================

impl BridgeConfig {
    /// Load config from a JSON file.
    ///
    /// Falls back to defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read, parsed,
    /// or fails validation.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.to_path_buf(),
                source: e,
            })?;

        let config: BridgeConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint).map_err(|e| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("Invalid endpoint URL: {e}"),
        })?;

        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Endpoint must be ws:// or wss://, got {}", url.scheme()),
            });
        }

        if self.reconnect_delay_ms == 0 || self.restart_delay_ms == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Reconnect delays must be non-zero".to_string(),
            });
        }

        if self.ping_interval_ms == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Ping interval must be non-zero".to_string(),
            });
        }

        if self.pong_timeout_ms <= self.ping_interval_ms {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Pong timeout ({} ms) must exceed the ping interval ({} ms)",
                    self.pong_timeout_ms, self.ping_interval_ms
                ),
            });
        }

        if self.log_buffer == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Log buffer capacity must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }
}
