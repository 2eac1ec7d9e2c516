// Unit tests for bridge configuration loading and validation

use crate::BRIDGE_WS_URL;
use crate::config::BridgeConfig;
use crate::error::config::ConfigError;

/// **VALUE**: Verifies defaults match the nominal protocol timings.
///
/// **WHY THIS MATTERS**: These values shape the reconnect and liveness
/// behavior of every deployment that ships without a config file.
///
/// **BUG THIS CATCHES**: Would catch an accidental change to a default
/// constant or a default function wired to the wrong field.
#[test]
fn given_no_config_file_when_defaulted_then_nominal_timings_apply() {
    let config = BridgeConfig::default();

    assert_eq!(config.endpoint, BRIDGE_WS_URL);
    assert_eq!(config.reconnect_delay_ms, 1_000);
    assert_eq!(config.restart_delay_ms, 5_000);
    assert_eq!(config.ping_interval_ms, 5_000);
    assert_eq!(config.pong_timeout_ms, 12_000);
    assert!(config.validate().is_ok(), "defaults must validate");
}

/// **VALUE**: Verifies endpoint scheme validation.
///
/// **WHY THIS MATTERS**: A mistyped `http://` endpoint would fail only at
/// dial time with a confusing transport error; validation catches it at
/// load time with a clear message.
///
/// **BUG THIS CATCHES**: Would catch validation accepting non-WebSocket
/// schemes or unparseable URLs.
#[test]
fn given_non_websocket_endpoint_when_validated_then_error() {
    let mut config = BridgeConfig::default();

    config.endpoint = "http://bridge.local/ws".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));

    config.endpoint = "not a url".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));

    config.endpoint = "wss://bridge.local/ws".to_string();
    assert!(config.validate().is_ok());
}

/// **VALUE**: Verifies the liveness window must exceed the probe interval.
///
/// **WHY THIS MATTERS**: A pong timeout at or below the ping interval would
/// declare every healthy connection dead before the first acknowledgment
/// could arrive, producing a reconnect loop.
///
/// **BUG THIS CATCHES**: Would catch the timer relation check being dropped
/// or inverted.
#[test]
fn given_pong_timeout_not_exceeding_ping_interval_when_validated_then_error() {
    let mut config = BridgeConfig::default();
    config.ping_interval_ms = 5_000;
    config.pong_timeout_ms = 5_000;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));
}

/// **VALUE**: Verifies zero timers are rejected.
///
/// **WHY THIS MATTERS**: A zero reconnect delay is a tight dial loop against
/// a dead backend; a zero ping interval floods the socket with probes.
///
/// **BUG THIS CATCHES**: Would catch validation allowing degenerate timer
/// values through.
#[test]
fn given_zero_timers_when_validated_then_error() {
    let mut config = BridgeConfig::default();
    config.reconnect_delay_ms = 0;
    assert!(config.validate().is_err());

    let mut config = BridgeConfig::default();
    config.ping_interval_ms = 0;
    assert!(config.validate().is_err());

    let mut config = BridgeConfig::default();
    config.log_buffer = 0;
    assert!(config.validate().is_err());
}

/// **VALUE**: Verifies a missing config file falls back to defaults while a
/// corrupt one is a hard error.
///
/// **WHY THIS MATTERS**: Shipping without a config file is the normal case
/// and must work; silently replacing a corrupt file with defaults would mask
/// an operator mistake.
///
/// **BUG THIS CATCHES**: Would catch load() treating a parse failure as the
/// missing-file case.
#[test]
fn given_missing_or_corrupt_file_when_loaded_then_defaults_or_error() {
    let dir = tempfile::tempdir().expect("create temp dir");

    let missing = dir.path().join("does-not-exist.json");
    let config = BridgeConfig::load(&missing).expect("missing file should default");
    assert_eq!(config.endpoint, BRIDGE_WS_URL);

    let corrupt = dir.path().join("bridge.json");
    std::fs::write(&corrupt, "{ not json").expect("write corrupt file");
    assert!(matches!(
        BridgeConfig::load(&corrupt),
        Err(ConfigError::ParseError { .. })
    ));
}

/// **VALUE**: Verifies a partial config file overrides only the fields it
/// names.
///
/// **WHY THIS MATTERS**: Operators typically set just the endpoint; every
/// other knob must keep its default.
///
/// **BUG THIS CATCHES**: Would catch a missing `#[serde(default)]` turning a
/// partial file into a parse error.
#[test]
fn given_partial_file_when_loaded_then_unnamed_fields_keep_defaults() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("bridge.json");
    std::fs::write(&path, r#"{"endpoint":"ws://10.0.0.7/ws"}"#).expect("write config");

    let config = BridgeConfig::load(&path).expect("partial file should load");

    assert_eq!(config.endpoint, "ws://10.0.0.7/ws");
    assert_eq!(config.reconnect_delay_ms, 1_000);
    assert_eq!(config.pong_timeout_ms, 12_000);
}
