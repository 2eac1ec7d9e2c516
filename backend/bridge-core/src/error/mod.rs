pub mod client;
pub mod config;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Client(#[from] client::ClientError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
