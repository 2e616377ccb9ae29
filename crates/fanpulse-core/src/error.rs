//! Error types for the fanpulse sync pipeline.

use thiserror::Error;

/// Result type alias using fanpulse's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fanpulse operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate budget exhausted for the current window.
    ///
    /// Distinct from network failures: the external call was never made and
    /// no budget was consumed. Callers decide whether to retry later.
    #[error("Rate limit exceeded: {consumed}/{limit} points in current window")]
    RateLimitExceeded {
        /// Points already consumed in the window.
        consumed: i32,
        /// Window point limit.
        limit: i32,
    },

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Scraper failure (browser launch, navigation, timeout)
    #[error("Scrape error: {0}")]
    Scrape(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the fail-fast quota error, which callers are expected to
    /// handle differently from transient network failures.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimitExceeded { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
