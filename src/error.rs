//! # error
//!
//! Library error types.
//!
//! [`FetchError`] splits into *transient* failures (retried by
//! [`RetryPolicy`](crate::transport::RetryPolicy), then downgraded to a
//! per-cycle skip) and *permanent* ones (never retried). [`IndicatorError`]
//! covers degenerate numeric input and is always handled where it arises.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    // ── Transient ─────────────────────────────────────────────────────────────
    /// HTTP 429 / 418, or a throttling code in the response envelope.
    #[error("rate limited by {endpoint} (HTTP {status})")]
    RateLimited { endpoint: String, status: u16 },

    #[error("request to {endpoint} timed out")]
    TimedOut { endpoint: String },

    /// Connect failure or the connection dropped while reading the body.
    #[error("connection to {endpoint} dropped: {reason}")]
    Disconnected { endpoint: String, reason: String },

    #[error("server error from {endpoint} (HTTP {status})")]
    ServerError { endpoint: String, status: u16 },

    // ── Permanent ─────────────────────────────────────────────────────────────
    #[error("invalid endpoint URL '{0}'")]
    InvalidUrl(String),

    /// Any 4xx that is not a rate limit.
    #[error("{endpoint} rejected the request (HTTP {status})")]
    Rejected { endpoint: String, status: u16 },

    /// reqwest refused the request outright (e.g. a redirect loop).
    #[error("request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    /// The exchange answered 200 but reported an error in its envelope.
    #[error("{endpoint} returned an API error: {message}")]
    Api { endpoint: String, message: String },

    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },

    #[error("unsupported exchange '{0}'")]
    UnsupportedExchange(String),

    /// The adapter lacks an optional capability (e.g. candles).
    #[error("{exchange} does not support {capability}")]
    Unsupported {
        exchange: String,
        capability: &'static str,
    },

    // ── Retry outcome ─────────────────────────────────────────────────────────
    /// Every attempt failed transiently.
    #[error("gave up on {endpoint} after {attempts} attempts: {last}")]
    Exhausted {
        endpoint: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// `true` for failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. }
                | FetchError::TimedOut { .. }
                | FetchError::Disconnected { .. }
                | FetchError::ServerError { .. }
        )
    }

    pub fn malformed(endpoint: &str, reason: impl Into<String>) -> Self {
        FetchError::Malformed {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IndicatorError {
    /// `percent_change` against a zero price.
    #[error("cannot compute a percent change from a zero baseline")]
    ZeroBaseline,
}
