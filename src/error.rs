//! Raven error types

use std::time::Duration;

/// Raven error types
#[derive(Debug, thiserror::Error)]
pub enum RavenError {
    // Dispatch errors
    /// The requested (or default) tool is not registered.
    #[error("tool not found: {name} (available: {available:?})")]
    ToolNotFound { name: String, available: Vec<String> },

    // Execution errors
    /// The tool exceeded its deadline on the final attempt.
    #[error("tool '{tool}' timed out after {timeout:?} ({attempts} attempts)")]
    ExecutionTimeout {
        tool: String,
        timeout: Duration,
        attempts: u32,
    },

    /// The tool failed on the final attempt.
    #[error("tool '{tool}' failed after {attempts} attempts: {source}")]
    ExecutionFailure {
        tool: String,
        attempts: u32,
        #[source]
        source: Box<RavenError>,
    },

    // Storage errors
    /// Cache snapshot could not be read or written. Never fatal: the store
    /// keeps running in memory.
    #[error("cache persistence error: {0}")]
    Persistence(String),

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("data error: {0}")]
    DataError(String),

    #[error("empty response from upstream")]
    EmptyResponse,

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RavenError {
    /// Whether the error is likely to go away on its own.
    ///
    /// The executor retries every failure regardless; this classification
    /// feeds log fields and metric labels.
    pub fn is_transient(&self) -> bool {
        match self {
            RavenError::Http(_) | RavenError::RateLimited { .. } | RavenError::EmptyResponse => {
                true
            }
            RavenError::Api { status, .. } => *status >= 500,
            RavenError::ExecutionTimeout { .. } => true,
            RavenError::ExecutionFailure { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Provider-supplied retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RavenError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RavenError {
    fn from(err: reqwest::Error) -> Self {
        RavenError::Http(err.to_string())
    }
}

/// Result type alias for Raven operations
pub type Result<T> = std::result::Result<T, RavenError>;
