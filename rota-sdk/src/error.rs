//! Errors returned by gateway calls.

use std::time::Duration;

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from the Web API.
    #[error("{method} returned HTTP {status}")]
    Status { method: &'static str, status: u16 },

    /// Slack answered `ok: false`.
    #[error("{method} failed: {code}")]
    Api { method: &'static str, code: String },

    /// Slack asked us to slow down.
    #[error("{method} rate limited (retry after {retry_after:?})")]
    RateLimited {
        method: &'static str,
        retry_after: Option<Duration>,
    },

    /// Response body did not match the expected shape.
    #[error("{method} returned an unexpected body: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } => true,
            Error::Status { status, .. } => *status >= 500,
            Error::Api { code, .. } => code == "ratelimited",
            Error::Decode { .. } => false,
        }
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
