//! Integration tests for the bridge connection manager.
//!
//! Each test runs a real WebSocket backend on an ephemeral localhost port
//! and drives a [`bridge_core::BridgeClient`] against it.

mod dispatch;
mod heartbeat;
mod helpers;
mod lifecycle;
mod requests;
