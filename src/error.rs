//! Error types for the pipeline client

use thiserror::Error;

/// Pipeline client errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("WebSocket connection error: {0}")]
    ConnectError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Transport send error: {0}")]
    TransportError(String),

    #[error("Failed to decode message: {0}")]
    DecodeError(String),

    #[error("Transport closed")]
    TransportClosed,

    #[error("Message handler failed: {0}")]
    HandlerError(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Receive loop already running")]
    AlreadyStreaming,

    #[error("No tokio runtime available to spawn the receive loop")]
    RuntimeUnavailable,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::DecodeError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
