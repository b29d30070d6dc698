//! Outbound product link construction.
//!
//! A canonical product link is `https://<marketplace-domain>/dp/<asin>`. The
//! affiliate variant appends `tag`, `linkCode`, `camp`, and `creative` query
//! parameters in that order.

use std::sync::LazyLock;

use regex::Regex;

/// Matches an ASIN segment in `/dp/<asin>` or `/gp/product/<asin>` paths.
static ASIN_IN_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:dp|gp/product)/([A-Za-z0-9]{10})").expect("invalid regex"));

/// Regional marketplace domains recognized when rebuilding links.
const REGIONAL_DOMAINS: &[&str] = &[
    "amazon.co.uk",
    "amazon.de",
    "amazon.fr",
    "amazon.ca",
    "amazon.com.au",
    "amazon.co.jp",
    "amazon.in",
];

/// Canonical product URL for an ASIN on the default marketplace.
pub fn product_link(asin: &str) -> String {
    format!("https://www.amazon.com/dp/{asin}")
}

/// Extract the ASIN from a product URL path, if present.
pub fn asin_from_url(url: &str) -> Option<String> {
    ASIN_IN_PATH.captures(url).map(|c| c[1].to_string())
}

/// Build an affiliate-tagged link for a product URL.
///
/// When the URL carries an ASIN, the link is rebuilt in canonical `/dp/` form
/// on the URL's regional domain (default `www.amazon.com`) with the full
/// Associates parameter set. Otherwise the parameters are appended to the
/// URL as-is.
pub fn affiliate_link(product_url: &str, tag: &str) -> String {
    if let Some(asin) = asin_from_url(product_url) {
        let domain = REGIONAL_DOMAINS
            .iter()
            .find(|d| product_url.contains(*d))
            .copied()
            .unwrap_or("www.amazon.com");
        return format!("https://{domain}/dp/{asin}?tag={tag}&linkCode=as2&camp=1789&creative=9325");
    }

    let separator = if product_url.contains('?') { '&' } else { '?' };
    format!("{product_url}{separator}tag={tag}&linkCode=as2&camp=1789&creative=9325")
}
