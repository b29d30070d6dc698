//! Unified error types for dealharvest.
//!
//! Pipeline entry points never let these escape: a failed unit of work (one
//! source fetch, one candidate, one URL probe) degrades to an empty or failed
//! result for that unit only.

/// Unified error types for the deal ingestion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Response body too short to be a real document.
    #[error("FETCH_TOO_SHORT: {0} bytes")]
    FetchTooShort(usize),

    /// Anti-automation challenge detected in the response body.
    #[error("FETCH_BLOCKED: {0}")]
    FetchBlocked(String),

    /// Rate limited by the source (HTTP 429).
    #[error("RATE_LIMITED: {0}")]
    RateLimited(String),

    /// HTTP error response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Retries exhausted for a source.
    #[error("RETRIES_EXHAUSTED: {0}")]
    RetriesExhausted(String),
}
