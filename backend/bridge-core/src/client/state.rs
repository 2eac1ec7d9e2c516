//! Process-wide connection state, observable by external consumers.

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Connection state as published through the state watch channel.
///
/// Mutated only by the connection manager. `Disconnected` is reached only
/// through explicit shutdown (or before the first connect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl Display for ConnectionState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            Self::Disconnected => write!(formatter, "disconnected"),
            Self::Connecting => write!(formatter, "connecting"),
            Self::Connected => write!(formatter, "connected"),
        }
    }
}
