use common::ErrorLocation;

use thiserror::Error;

/// Errors that can occur in the monitor binary.
///
/// Connection-level failures stay in `bridge-core`; this covers startup
/// concerns such as logging and configuration.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Error from this application
    #[error("Monitor Error: {message} {location}")]
    Monitor {
        message: String,
        location: ErrorLocation,
    },
}
