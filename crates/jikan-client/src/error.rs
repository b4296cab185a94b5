//! Error types for the Jikan API access layer.

use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the API client.
///
/// Local rate limiting never appears here: admission delays are resolved
/// internally by waiting. Every variant carries the request URL so callers
/// can log a failure without reconstructing context.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Upstream kept answering 429 after the retry budget was spent.
    #[error("rate limited by upstream after {attempts} attempts: {url}")]
    RateLimited { url: String, attempts: u32 },

    /// Any non-2xx status other than 429. Not retried.
    #[error("upstream returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    /// Network-level failure after the retry budget was spent.
    #[error("network error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response body that is not valid JSON or does not match the
    /// expected shape. Not retried.
    #[error("malformed response from {url}: {source}")]
    MalformedData {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// URL of the request that produced this error.
    pub fn url(&self) -> &str {
        match self {
            ApiError::RateLimited { url, .. }
            | ApiError::Status { url, .. }
            | ApiError::Transport { url, .. }
            | ApiError::MalformedData { url, .. } => url,
        }
    }
}
