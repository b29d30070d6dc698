//! Outbound link validation with bounded concurrency.
//!
//! ### Single-URL steps
//! 1. Reject malformed URLs (no scheme/host) and non-marketplace hosts
//!    immediately, no retry; these are caller errors.
//! 2. Ranged GET (first 1KB) following redirects; 200/206/416 count as
//!    reachable. A 405 gets one full-GET fallback with a 5s timeout.
//! 3. Timeouts and transport errors retry with a fixed 1s pause.
//! 4. Affiliate-tag mismatch is a logged warning, never a validity failure:
//!    reachability and tag correctness are separate concerns.
//!
//! ### Batch semantics
//! Probes fan out under a counting semaphore; results come back in input
//! order regardless of completion order, and a panicked probe task becomes a
//! failed entry without aborting its siblings.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, HeaderMap, HeaderValue, RANGE},
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use dealharvest_core::{AppConfig, Error, LinkValidationResult, ValidationStats, is_valid_asin};

/// Pause between retry attempts on timeout/transport errors.
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Timeout for the full-GET fallback after a 405.
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Statuses accepted for the ranged probe (416 means the server rejected the
/// range but the resource exists).
const PROBE_OK: &[u16] = &[200, 206, 416];

/// Check that a URL points at an allow-listed marketplace domain.
///
/// A leading `www.` on the host is ignored. When the path carries a
/// product-identifier segment (`/dp/<id>` or `/gp/product/<id>`), the
/// segment must be a well-formed 10-character identifier.
pub fn is_marketplace_url(url: &Url, domains: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };

    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if !domains.iter().any(|domain| domain == host) {
        return false;
    }

    if let Some(segment) = product_id_segment(url.path()) {
        return is_valid_asin(&segment);
    }

    true
}

/// The path segment following `/dp/` or `/gp/product/`, if any.
fn product_id_segment(path: &str) -> Option<String> {
    let rest = path
        .split_once("/dp/")
        .or_else(|| path.split_once("/gp/product/"))
        .map(|(_, rest)| rest)?;

    let segment: String = rest.chars().take_while(|c| *c != '/' && *c != '?' && *c != '#').collect();
    if segment.is_empty() { None } else { Some(segment) }
}

/// Verify that a URL carries the expected affiliate `tag` query parameter.
///
/// # Errors
///
/// Returns a human-readable reason when the tag is absent or differs.
pub fn verify_affiliate_tag(url: &str, expected_tag: &str) -> Result<(), String> {
    if url.is_empty() || expected_tag.is_empty() {
        return Err("Missing URL or affiliate tag".into());
    }

    let parsed = Url::parse(url).map_err(|e| format!("Error verifying tag: {e}"))?;

    match parsed.query_pairs().find(|(key, _)| key == "tag") {
        None => Err("No 'tag' parameter found in URL".into()),
        Some((_, actual)) if actual != expected_tag => {
            Err(format!("Tag mismatch: expected '{expected_tag}', got '{actual}'"))
        }
        Some(_) => Ok(()),
    }
}

/// Outcome of one probe request that reached the server.
enum ProbeOutcome {
    Reachable { status: u16, final_url: String },
    Rejected { status: u16 },
}

/// Concurrent outbound link validator.
///
/// Owns one pooled `reqwest::Client` shared by all probes of a batch; the
/// pool is created once per validator and released on drop.
#[derive(Clone)]
pub struct LinkValidator {
    http: Client,
    config: AppConfig,
}

impl LinkValidator {
    /// Create a validator from application configuration.
    pub fn new(config: AppConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.validation_timeout())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Validate one URL. Never errors; every failure mode becomes a failed
    /// result entry.
    pub async fn validate(&self, url: &str) -> LinkValidationResult {
        let start = Instant::now();

        let parsed = match Url::parse(url) {
            Ok(parsed) if parsed.has_host() => parsed,
            _ => return LinkValidationResult::failed(url, "Invalid URL format"),
        };

        if !is_marketplace_url(&parsed, &self.config.marketplace_domains) {
            return LinkValidationResult::failed(url, "Not an Amazon link");
        }

        let attempts = self.config.validation_max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.probe(url).await {
                Ok(ProbeOutcome::Reachable { status, final_url }) => {
                    if let Some(expected) = &self.config.affiliate_tag
                        && let Err(reason) = verify_affiliate_tag(&final_url, expected)
                    {
                        // Reachability and tag correctness are separate
                        // concerns; a bad tag never invalidates the link.
                        tracing::warn!(url, %reason, "affiliate tag verification failed");
                    }

                    tracing::debug!(url, status, "link validated");
                    return LinkValidationResult {
                        url: url.to_string(),
                        is_valid: true,
                        status_code: Some(status),
                        error_message: None,
                        redirect_url: (final_url != url).then_some(final_url),
                        response_time: start.elapsed().as_secs_f64(),
                    };
                }
                Ok(ProbeOutcome::Rejected { status }) => {
                    tracing::warn!(url, status, "link failed");
                    return LinkValidationResult {
                        url: url.to_string(),
                        is_valid: false,
                        status_code: Some(status),
                        error_message: Some(format!("HTTP {status}")),
                        redirect_url: None,
                        response_time: start.elapsed().as_secs_f64(),
                    };
                }
                Err(e) => {
                    last_error = if e.is_timeout() { "Request timeout".to_string() } else { format!("Client error: {e}") };
                    tracing::debug!(url, attempt, error = %last_error, "probe attempt failed");

                    if attempt < attempts {
                        tokio::time::sleep(RETRY_PAUSE).await;
                    }
                }
            }
        }

        LinkValidationResult {
            url: url.to_string(),
            is_valid: false,
            status_code: None,
            error_message: Some(last_error),
            redirect_url: None,
            response_time: start.elapsed().as_secs_f64(),
        }
    }

    /// One probe round-trip: ranged GET, with a full-GET fallback on 405.
    async fn probe(&self, url: &str) -> Result<ProbeOutcome, reqwest::Error> {
        let response = self.http.get(url).header(RANGE, "bytes=0-1023").send().await?;

        let status = response.status();
        if PROBE_OK.contains(&status.as_u16()) {
            return Ok(ProbeOutcome::Reachable { status: status.as_u16(), final_url: response.url().to_string() });
        }

        if status == StatusCode::METHOD_NOT_ALLOWED {
            let fallback = self.http.get(url).timeout(FALLBACK_TIMEOUT).send().await?;
            let fallback_status = fallback.status();
            if fallback_status == StatusCode::OK {
                return Ok(ProbeOutcome::Reachable {
                    status: fallback_status.as_u16(),
                    final_url: fallback.url().to_string(),
                });
            }
            return Ok(ProbeOutcome::Rejected { status: fallback_status.as_u16() });
        }

        Ok(ProbeOutcome::Rejected { status: status.as_u16() })
    }

    /// Validate a batch of URLs with bounded concurrency.
    ///
    /// Results are in input order regardless of completion order. A panicked
    /// or cancelled probe task becomes a failed entry for its URL; the batch
    /// call itself never fails.
    pub async fn validate_batch(&self, urls: &[String]) -> Vec<LinkValidationResult> {
        if urls.is_empty() {
            return Vec::new();
        }

        tracing::info!(count = urls.len(), concurrency = self.config.validation_concurrency, "validating links");

        let semaphore = Arc::new(Semaphore::new(self.config.validation_concurrency));
        let mut join_set = JoinSet::new();

        for (index, url) in urls.iter().enumerate() {
            let validator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let url = url.clone();

            join_set.spawn(async move {
                // Hold the permit for the task's duration to enforce the
                // concurrency bound. The semaphore is never closed, so
                // acquisition cannot fail in practice.
                let _permit = semaphore.acquire_owned().await.ok();
                (index, validator.validate(&url).await)
            });
        }

        let mut slots: Vec<Option<LinkValidationResult>> = vec![None; urls.len()];
        let mut next_unattributed = 0usize;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => {
                    // The task never reported its index; attribute the
                    // failure to the first still-empty slot.
                    tracing::error!(error = %e, "validation task failed");
                    while next_unattributed < slots.len() && slots[next_unattributed].is_some() {
                        next_unattributed += 1;
                    }
                    if next_unattributed < slots.len() {
                        slots[next_unattributed] =
                            Some(LinkValidationResult::failed(&urls[next_unattributed], format!("Exception: {e}")));
                    }
                }
            }
        }

        let results: Vec<LinkValidationResult> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| LinkValidationResult::failed(&urls[index], "Exception: task did not complete"))
            })
            .collect();

        let valid = results.iter().filter(|r| r.is_valid).count();
        tracing::info!(valid, invalid = results.len() - valid, "validation complete");

        results
    }

    /// Compute summary statistics for a batch of results.
    pub fn stats(&self, results: &[LinkValidationResult]) -> ValidationStats {
        ValidationStats::from_results(results)
    }
}
