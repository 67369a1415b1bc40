//! Error types for floodgate.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying I/O failure (file-backed stores)
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend could not encode or decode its on-disk document
    #[error("Storage encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backend is unreachable or refused the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Main error type for floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A storage backend failed during a check; propagated untouched
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored request log could not be parsed on the check path.
    /// Cleanup deletes these silently instead of surfacing them.
    #[error("Corrupt request log under key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The local window for an action is exhausted. Raised only by the
    /// HTTP wrapper; the core check reports this as a `Decision` instead.
    #[error("{message} (action '{action}', retry after {retry_after:?})")]
    Throttled {
        action: String,
        message: String,
        retry_after: Duration,
    },

    /// The upstream service answered 429
    #[error("Upstream rate limit hit (retry after {retry_after:?})")]
    UpstreamThrottled { retry_after: Option<Duration> },

    /// Transport failure inside the HTTP wrapper
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;
