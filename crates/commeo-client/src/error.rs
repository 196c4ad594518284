//! Client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("protocol error: {0}")]
    Protocol(#[from] commeo_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] commeo_transport::TransportError),

    #[error("config error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for ClientError {
    fn from(e: toml::de::Error) -> Self {
        ClientError::Config(e.to_string())
    }
}
