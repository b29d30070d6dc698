//! HTTP fetch client for marketplace deal pages.
//!
//! ### Retry policy
//! - Up to `max_retries` attempts total per source URL.
//! - HTTP 429: delay doubles per retry starting at `retry_delay`, capped at 60s.
//! - Soft block (challenge page in a 200 body): doubled delay.
//! - Any other failure (non-200, short body, timeout, transport): flat delay.
//!
//! ### Blocking heuristics
//! - Bodies under 1000 bytes are treated as failed fetches; real deal pages
//!   are never that small.
//! - Bodies containing "captcha", "robot", or "access denied"
//!   (case-insensitive) are challenge pages, not content.

pub mod url;

use std::time::Duration;

use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue},
};

pub use self::url::{UrlError, sanitize};

use dealharvest_core::{AppConfig, Error};

/// Bodies shorter than this are implausible for a real deal page.
const MIN_BODY_BYTES: usize = 1000;

/// Upper bound for the 429 backoff ladder.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Case-insensitive markers of anti-automation challenge pages.
const BLOCK_MARKERS: &[&str] = &["captcha", "robot", "access denied"];

/// Check a response body for soft-block markers.
pub fn looks_blocked(body: &str) -> bool {
    let lowered = body.to_lowercase();
    BLOCK_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// HTTP fetch client with a browser-like header set and bounded retries.
///
/// Owns one pooled `reqwest::Client`, created once and reused across calls;
/// the pool is released when the client is dropped.
pub struct FetchClient {
    http: Client,
    config: AppConfig,
}

impl FetchClient {
    /// Create a new fetch client from application configuration.
    pub fn new(config: AppConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.request_timeout())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Fetch one source page as text, retrying per the module policy.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` without retrying for malformed input, and
    /// `Error::RetriesExhausted` once all attempts fail. Callers treat either
    /// as "this source produced nothing this run".
    pub async fn fetch_source(&self, url_str: &str) -> Result<String, Error> {
        let url = sanitize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut delay = self.config.retry_delay();
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_retries {
            match self.try_fetch(url.as_str()).await {
                Ok(body) => {
                    tracing::debug!(url = url.as_str(), attempt, bytes = body.len(), "source fetched");
                    return Ok(body);
                }
                Err(e) => {
                    let wait = match &e {
                        Error::RateLimited(_) => {
                            delay = (delay * 2).min(MAX_BACKOFF);
                            delay
                        }
                        Error::FetchBlocked(_) => delay * 2,
                        _ => delay,
                    };
                    tracing::warn!(url = url.as_str(), attempt, error = %e, "fetch attempt failed");
                    last_error = e.to_string();

                    if attempt < self.config.max_retries {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        Err(Error::RetriesExhausted(format!("{} after {} attempts: {}", url, self.config.max_retries, last_error)))
    }

    async fn try_fetch(&self, url: &str) -> Result<String, Error> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(e.to_string())
                } else {
                    Error::HttpError(format!("network error: {}", e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited(url.to_string()));
        }
        if status != StatusCode::OK {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {}", e)))?;

        if body.len() < MIN_BODY_BYTES {
            return Err(Error::FetchTooShort(body.len()));
        }

        if looks_blocked(&body) {
            return Err(Error::FetchBlocked(url.to_string()));
        }

        Ok(body)
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
