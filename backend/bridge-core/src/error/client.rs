use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ClientError {
    /// A request was attempted without a live connection.
    #[error("Not Connected Error: {message} {location}")]
    NotConnected {
        message: String,
        location: ErrorLocation,
    },

    /// The connection that issued a request closed before its response arrived.
    #[error("Connection Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },

    /// The manager task is gone (all handles dropped or runtime shut down).
    #[error("Channel Error: {message} {location}")]
    Channel {
        message: String,
        location: ErrorLocation,
    },
}
