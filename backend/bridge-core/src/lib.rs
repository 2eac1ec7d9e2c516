pub mod client;
pub mod config;
pub mod error;
pub mod protocol;

#[cfg(test)]
mod tests;

pub use client::{BridgeClient, ConnectionState};
pub use config::BridgeConfig;
pub use error::CoreError;

pub const BRIDGE_HOSTNAME: &str = "econet-bridge.local";
pub const BRIDGE_WS_PATH: &str = "/ws";
pub const BRIDGE_WS_URL: &str =
    const_format::concatcp!("ws://", BRIDGE_HOSTNAME, BRIDGE_WS_PATH);
