//! Data model for the deal ingestion pipeline.
//!
//! A [`Product`] is a candidate record extracted from marketplace markup. It
//! only reaches downstream stages with a well-formed ASIN; everything else
//! degrades to a sentinel or "unknown" value rather than an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel shown when no price could be parsed out of the markup.
pub const PRICE_NOT_AVAILABLE: &str = "Price not available";

/// Fallback description when none could be extracted.
pub const GENERIC_DESCRIPTION: &str = "Amazon product with great reviews and competitive pricing.";

/// Maximum stored description length in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// Product category inferred from title keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Home,
    Fashion,
    Sports,
    Beauty,
    Books,
    /// Catch-all when no keyword matches.
    General,
}

impl Category {
    /// Infer a category from a product title.
    ///
    /// Keyword table ordered by category; first category with any keyword hit
    /// wins, else [`Category::General`].
    pub fn from_title(title: &str) -> Self {
        let title = title.to_lowercase();

        const TABLE: &[(Category, &[&str])] = &[
            (
                Category::Electronics,
                &["phone", "tablet", "laptop", "speaker", "headphone", "camera", "tv", "smart", "wireless"],
            ),
            (Category::Home, &["kitchen", "cooking", "chair", "table", "lamp", "bed", "pillow", "blanket"]),
            (Category::Fashion, &["shirt", "pants", "dress", "shoes", "jacket", "jeans", "clothing"]),
            (Category::Sports, &["fitness", "exercise", "gym", "workout", "sports", "running", "yoga"]),
            (Category::Beauty, &["beauty", "skincare", "makeup", "hair", "cosmetic", "shampoo"]),
            (Category::Books, &["book", "kindle", "novel", "textbook", "magazine"]),
        ];

        for (category, keywords) in TABLE {
            if keywords.iter().any(|k| title.contains(k)) {
                return *category;
            }
        }

        Category::General
    }
}

/// A candidate deal record extracted from one marketplace item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product title, trimmed, at least 5 characters.
    pub title: String,
    /// Display price, or [`PRICE_NOT_AVAILABLE`].
    pub price: String,
    /// Display discount (e.g. "25% off"), badge text, or empty.
    pub discount: String,
    /// Canonical product URL.
    pub link: String,
    /// 10-character alphanumeric product identifier.
    pub asin: String,
    /// Category inferred from the title.
    pub category: Category,
    /// Star rating in [0.0, 5.0]; 0.0 means unknown.
    pub rating: f64,
    /// Review count; 0 means unknown or none.
    pub review_count: u32,
    /// Short description, capped at [`MAX_DESCRIPTION_CHARS`].
    pub description: String,
    /// Full-resolution image URL, or empty.
    pub image_url: String,
}

impl Product {
    /// Whether the record carries the minimum required data.
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty() && !self.price.is_empty() && !self.link.is_empty()
    }
}

/// Check that an identifier is exactly 10 alphanumeric characters.
pub fn is_valid_asin(asin: &str) -> bool {
    asin.len() == 10 && asin.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Outcome of probing one outbound URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkValidationResult {
    /// The URL as supplied by the caller.
    pub url: String,
    /// Whether the URL was reachable and acceptable.
    pub is_valid: bool,
    /// HTTP status of the terminal response, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Failure reason, when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Final URL after redirects, only when it differs from the input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    /// Elapsed seconds, 0.0 when no request was measured.
    pub response_time: f64,
}

impl LinkValidationResult {
    /// A failed result with no measured response time.
    pub fn failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_valid: false,
            status_code: None,
            error_message: Some(message.into()),
            redirect_url: None,
            response_time: 0.0,
        }
    }
}

/// Aggregate statistics over one validation batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationStats {
    pub total_links: usize,
    pub valid_links: usize,
    pub invalid_links: usize,
    /// Percentage of valid links.
    pub success_rate: f64,
    /// Mean response time over non-zero samples, rounded to 3 decimals.
    pub average_response_time: f64,
    /// Count per literal error message.
    pub error_breakdown: BTreeMap<String, u32>,
}

impl ValidationStats {
    /// Compute summary statistics for a batch of results.
    pub fn from_results(results: &[LinkValidationResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }

        let valid_links = results.iter().filter(|r| r.is_valid).count();
        let invalid_links = results.len() - valid_links;

        let mut error_breakdown: BTreeMap<String, u32> = BTreeMap::new();
        for result in results.iter().filter(|r| !r.is_valid) {
            let message = result.error_message.as_deref().unwrap_or("Unknown error");
            *error_breakdown.entry(message.to_string()).or_insert(0) += 1;
        }

        let samples: Vec<f64> = results.iter().map(|r| r.response_time).filter(|t| *t > 0.0).collect();
        let average_response_time = if samples.is_empty() {
            0.0
        } else {
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            (mean * 1000.0).round() / 1000.0
        };

        Self {
            total_links: results.len(),
            valid_links,
            invalid_links,
            success_rate: valid_links as f64 / results.len() as f64 * 100.0,
            average_response_time,
            error_breakdown,
        }
    }
}
