//! Error types for card_resolver

use std::time::Duration;
use thiserror::Error;

/// Unified error type for resolution, enrichment and persistence
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Entity absent at every tier
    #[error("Not found: {0}")]
    NotFound(String),
    /// External catalog could not be reached or answered with garbage
    #[error("Source unavailable ({source_name}): {reason}")]
    SourceUnavailable { source_name: String, reason: String },
    /// An external call exceeded its time budget
    #[error("Timed out after {after:?}: {operation}")]
    Timeout { operation: String, after: Duration },
    /// Provider credits are used up; source calls are short-circuited
    #[error("Quota exhausted, source calls suspended until credits recover")]
    QuotaExhausted,
    /// A store write failed
    #[error("Persistence failure: {0}")]
    Persistence(String),
    /// HTTP request failed (network error, connect failure, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP error status code
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Failed to parse JSON
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Identifier could not be parsed
    #[error("Invalid id: {0}")]
    InvalidId(String),
    /// Secondary data unavailable. Caught inside the enrichment pipeline.
    #[error("Enrichment unavailable: {0}")]
    Enrichment(String),
}

/// Short alias for [`ResolverError`]
pub type Error = ResolverError;

impl ResolverError {
    pub fn source_unavailable(source_name: &str, reason: impl ToString) -> Self {
        ResolverError::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether a caller may reasonably try the same call again
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolverError::Network(_)
            | ResolverError::Timeout { .. }
            | ResolverError::SourceUnavailable { .. } => true,
            ResolverError::HttpStatus(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Status code the HTTP adapter reports for this error
    pub fn http_status(&self) -> u16 {
        match self {
            ResolverError::NotFound(_) => 404,
            ResolverError::InvalidId(_) => 400,
            ResolverError::QuotaExhausted => 503,
            ResolverError::SourceUnavailable { .. }
            | ResolverError::Timeout { .. }
            | ResolverError::Network(_)
            | ResolverError::HttpStatus(_) => 502,
            _ => 500,
        }
    }
}

/// Result alias for card_resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;
