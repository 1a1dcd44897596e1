//! Error types for stevedore-core.

use std::path::PathBuf;
use stevedore_engine::EngineError;
use thiserror::Error;

/// Result type alias for stevedore-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building images.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An engine call failed
    #[error("{context}: {reason}")]
    Engine {
        /// What was being attempted
        context: String,
        /// Reason extracted from the engine's answer
        reason: String,
    },

    /// A command inside the container exited with a non-zero code
    #[error("command `{command}` exited with code {code}")]
    CommandFailed {
        /// The command line, joined with spaces
        command: String,
        /// Exit code reported by the engine
        code: i64,
    },

    /// A copy referenced a host file that does not exist
    #[error("file does not exist on host at '{}'", .0.display())]
    MissingFile(PathBuf),

    /// Downloading a remote file failed
    #[error("failed to download '{url}' -> '{target}': {reason}")]
    Fetch {
        /// Source URL
        url: String,
        /// Cache reference the file was meant for
        target: String,
        /// Underlying failure
        reason: String,
    },

    /// Copying a file into the container failed
    #[error("copy '{origin}' -> '{dest}' failed: {cause}")]
    Copy {
        /// Source reference
        origin: String,
        /// Destination reference
        dest: String,
        /// Underlying failure
        #[source]
        cause: Box<CoreError>,
    },

    /// A queued script step failed; the remaining steps were skipped
    #[error("step {index} ({procedure}) failed: {cause}")]
    Step {
        /// Zero-based position of the step in the queue
        index: usize,
        /// Name of the failing procedure
        procedure: String,
        /// Underlying failure
        #[source]
        cause: Box<CoreError>,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Wrap an engine failure with a description of what was attempted.
    pub fn engine(context: impl Into<String>, err: &EngineError) -> Self {
        let reason = err.reason().unwrap_or_else(|| match err.status() {
            Some(status) => format!("engine returned status {status}"),
            None => "unknown engine error".to_string(),
        });
        CoreError::Engine {
            context: context.into(),
            reason,
        }
    }

    /// Follow `Step` and `Copy` wrappers down to the error that started it.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            CoreError::Step { cause, .. } | CoreError::Copy { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Exit code of the failed command, if a command failure caused this.
    pub fn exit_code(&self) -> Option<i64> {
        match self.root_cause() {
            CoreError::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}
