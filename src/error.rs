//! Error types for Chatdeck
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Chatdeck operations
///
/// This enum covers streaming failures, backend envelope failures,
/// configuration and credential problems, and the wrapped library errors
/// that bubble up from I/O, serialization and HTTP.
#[derive(Error, Debug)]
pub enum ChatdeckError {
    /// The response body could not be opened or read as a stream
    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    /// The backend answered with a non-success status or an empty answer
    #[error("Request failed: status={status}, {message}")]
    RequestFailed {
        /// HTTP status code returned by the backend
        status: u16,
        /// Additional context about the failure
        message: String,
    },

    /// The request could not be sent at all (connection refused, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// A streaming request is already outstanding for this session
    #[error("A request is already in flight for conversation {0}")]
    RequestInFlight(String),

    /// The backend envelope carried a code other than 200
    #[error("Backend error: code={code}, {message}")]
    Backend {
        /// Envelope `code` field
        code: i64,
        /// Envelope `message` field
        message: String,
    },

    /// A prompt with no visible text
    #[error("Prompt cannot be empty")]
    EmptyPrompt,

    /// A conversation or message could not be located
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local credential file errors
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// OS keyring errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ChatdeckError {
    /// Returns true for the failures a streaming request can end with
    ///
    /// These are the errors the chat session turns into an error-flagged
    /// assistant message instead of propagating.
    pub fn is_stream_failure(&self) -> bool {
        matches!(
            self,
            ChatdeckError::StreamUnavailable(_)
                | ChatdeckError::RequestFailed { .. }
                | ChatdeckError::Network(_)
                | ChatdeckError::Http(_)
        )
    }
}

/// Result type alias for Chatdeck operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
