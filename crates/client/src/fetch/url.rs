//! URL sanitation for source fetches and validation probes.

/// Error type for URL sanitation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Sanitize a URL string before any request is issued.
///
/// Steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Reject anything but http/https (covers `javascript:`, `data:`,
///    `vbscript:` and similar injection vectors in scraped hrefs)
/// 4. Lowercase the host, drop the fragment, keep the query intact
pub fn sanitize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let with_scheme;
    let candidate = if trimmed.contains("://") || trimmed.contains(':') {
        trimmed
    } else {
        with_scheme = format!("https://{trimmed}");
        &with_scheme
    };

    let mut parsed = url::Url::parse(candidate).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none() {
        return Err(UrlError::InvalidUrl("missing host".into()));
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
