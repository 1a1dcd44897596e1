//! Error types for stevedore-engine.

use thiserror::Error;

/// Result type alias for stevedore-engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while talking to the container engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine answered with a non-success status.
    #[error("engine returned status {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The request never got a response (socket closed, connection refused...)
    #[error("transport error: {0}")]
    Transport(String),

    /// Failed to build a request
    #[error("request error: {0}")]
    Request(String),

    /// The configured endpoint cannot be used
    #[error("invalid engine endpoint: {0}")]
    Endpoint(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hyper::Error> for EngineError {
    fn from(e: hyper::Error) -> Self {
        EngineError::Transport(e.to_string())
    }
}

impl EngineError {
    /// Best-effort human readable reason for this failure.
    ///
    /// For API errors the response body is inspected first: a body that is a
    /// bare JSON string wins, then a `message` field, then the raw body text.
    /// Every other kind falls back to its own display message. `None` means
    /// there is nothing better to say than the status code.
    pub fn reason(&self) -> Option<String> {
        match self {
            EngineError::Api { body, .. } => {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match serde_json::from_str::<serde_json::Value>(trimmed) {
                    Ok(serde_json::Value::String(s)) => Some(s),
                    Ok(value) => match value.get("message").and_then(|m| m.as_str()) {
                        Some(message) => Some(message.to_string()),
                        None => Some(trimmed.to_string()),
                    },
                    Err(_) => Some(trimmed.to_string()),
                }
            }
            other => Some(other.to_string()),
        }
    }

    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the engine reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
