use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid platform: {0:?} (expected 'edge' or 'user')")]
    InvalidPlatform(String),

    #[error("Invalid mode: {0:?} (expected 'pub' or 'sub')")]
    InvalidMode(String),

    #[error("Missing required configuration field: {0}")]
    MissingField(&'static str),

    #[error("Invalid stream URL: {0}")]
    InvalidStreamUrl(String),

    #[error("Invalid connect retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("Invalid frame size: must be greater than zero")]
    InvalidFrameSize,

    #[error("Invalid message type name: {0:?} (expected 'package/TypeName')")]
    InvalidMessageTypeName(String),

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),

    #[error("Process spawn failed: {0}")]
    ProcessSpawnFailed(String),

    #[error("Connection timed out after {attempts} attempts within {budget:?}")]
    ConnectionTimeout { budget: Duration, attempts: u32 },

    #[error("Stream read failed: {0}")]
    StreamReadFailed(String),

    #[error("Stream write failed: {0}")]
    StreamWriteFailed(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Message bus error: {0}")]
    Bus(String),

    #[error("Bridge not running")]
    BridgeNotRunning,
}

impl DomainError {
    /// Errors that abort startup before anything is registered on the bus.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPlatform(_)
                | Self::InvalidMode(_)
                | Self::MissingField(_)
                | Self::InvalidStreamUrl(_)
                | Self::InvalidRetryPolicy(_)
                | Self::InvalidFrameSize
        )
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
