//! Error types for the SmartQueue client

/// Errors that can occur while talking to the SmartQueue server
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Sign-in failed: {0}")]
    SignIn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("STOMP error: {0}")]
    Stomp(String),

    #[error("Session store error: {0}")]
    Session(String),
}

/// Result type alias for SmartQueue client operations
pub type Result<T> = std::result::Result<T, QueueError>;
