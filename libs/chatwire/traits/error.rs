use thiserror::Error;

/// Main error type for chatwire
#[derive(Error, Debug)]
pub enum ChatWireError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Command channel to the connection task is closed
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// One or more bus listeners failed during a publish
    #[error("{failed} listener(s) failed on topic '{topic}': {reason}")]
    Listener {
        topic: String,
        failed: usize,
        reason: String,
    },

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for chatwire operations
pub type Result<T> = std::result::Result<T, ChatWireError>;
