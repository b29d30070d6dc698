//! Per-field text parsers for noisy marketplace markup.
//!
//! Every parser is a pure function returning a default ("unknown") value on
//! failure. A failed parse is the expected path, not an error.

use std::sync::LazyLock;

use dealharvest_core::models::{MAX_DESCRIPTION_CHARS, PRICE_NOT_AVAILABLE};
use regex::Regex;

static PRICE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\d,]+\.?\d*").expect("invalid regex"));
static PERCENT_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*%").expect("invalid regex"));
static THOUSANDS_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([\d.]+)\s*[kK]").expect("invalid regex"));
static INTEGER_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").expect("invalid regex"));
static IMAGE_SIZE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\._[A-Z0-9,_]+_\.").expect("invalid regex"));

/// Rating patterns, most explicit first. A bare number is the last resort
/// because prices and counts also look like bare numbers.
static RATING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(\d+\.?\d*)\s*out of",
        r"(\d+\.?\d*)\s*stars?",
        r"(\d+\.?\d*)\s*/\s*5",
        r"rating[:\s]+(\d+\.?\d*)",
        r"(\d+\.?\d*)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid regex"))
    .collect()
});

/// Normalize a raw price string to a `$<amount>` display string.
///
/// Falls back to the first 50 characters of the raw text when no numeric
/// token is found, and to the sentinel when the text is empty.
pub fn clean_price(price_text: &str) -> String {
    let trimmed = price_text.trim();
    if trimmed.is_empty() {
        return PRICE_NOT_AVAILABLE.to_string();
    }

    let without_commas = trimmed.replace(',', "");
    match PRICE_TOKEN.find(&without_commas) {
        Some(m) => format!("${}", m.as_str()),
        None => trimmed.chars().take(50).collect(),
    }
}

/// Normalize a raw discount string to `"N% off"`, or pass badge text through
/// truncated to 20 characters when no percentage is present.
pub fn clean_discount(discount_text: &str) -> String {
    let trimmed = discount_text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match PERCENT_TOKEN.captures(trimmed) {
        Some(caps) => format!("{}% off", &caps[1]),
        None => trimmed.chars().take(20).collect(),
    }
}

/// Extract the discount percentage from a display string; 0.0 when absent.
pub fn discount_percentage(discount_text: &str) -> f64 {
    PERCENT_TOKEN
        .captures(discount_text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Parse a star rating out of free text.
///
/// Patterns tried in order: "N out of", "N star(s)", "N/5", "rating: N",
/// bare number. The first match inside [0, 5] wins; anything else is 0.0
/// (unknown).
pub fn parse_rating(rating_text: &str) -> f64 {
    let lowered = rating_text.to_lowercase();

    for pattern in RATING_PATTERNS.iter() {
        for caps in pattern.captures_iter(&lowered) {
            if let Ok(rating) = caps[1].parse::<f64>()
                && (0.0..=5.0).contains(&rating)
            {
                return rating;
            }
        }
    }

    0.0
}

/// Parse a review count out of free text.
///
/// Handles "1,234", "1.2k", "15K"; otherwise the first integer token.
/// Returns 0 (unknown) on failure.
pub fn parse_review_count(review_text: &str) -> u32 {
    let cleaned = review_text.replace(',', "");
    let cleaned = cleaned.trim();

    if let Some(caps) = THOUSANDS_SUFFIX.captures(cleaned)
        && let Ok(thousands) = caps[1].parse::<f64>()
    {
        return (thousands * 1000.0) as u32;
    }

    INTEGER_TOKEN
        .captures(cleaned)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .unwrap_or(0)
}

/// Strip the embedded size-encoding token from a marketplace image URL so the
/// full-resolution variant is requested.
pub fn normalize_image_url(image_url: &str) -> String {
    IMAGE_SIZE_TOKEN.replace_all(image_url, ".").into_owned()
}

/// Cap a description at [`MAX_DESCRIPTION_CHARS`] characters.
pub fn cap_description(text: &str) -> String {
    text.chars().take(MAX_DESCRIPTION_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_price_basic() {
        assert_eq!(clean_price("$1,299.99"), "$1299.99");
        assert_eq!(clean_price("29.99"), "$29.99");
    }

    #[test]
    fn test_clean_price_empty_is_sentinel() {
        assert_eq!(clean_price(""), PRICE_NOT_AVAILABLE);
        assert_eq!(clean_price("   "), PRICE_NOT_AVAILABLE);
    }

    #[test]
    fn test_clean_price_no_digits_truncates() {
        assert_eq!(clean_price("Price too low to display"), "Price too low to display");
    }

    #[test]
    fn test_clean_discount_percent() {
        assert_eq!(clean_discount("Save 25%"), "25% off");
        assert_eq!(clean_discount("-25 %"), "25% off");
    }

    #[test]
    fn test_clean_discount_badge_passthrough() {
        assert_eq!(clean_discount("Lightning Deal"), "Lightning Deal");
        assert_eq!(clean_discount("Limited time deal right now"), "Limited time deal r");
        assert_eq!(clean_discount(""), "");
    }

    #[test]
    fn test_discount_percentage() {
        assert_eq!(discount_percentage("25% off"), 25.0);
        assert_eq!(discount_percentage("Save 40 % today"), 40.0);
        assert_eq!(discount_percentage("Lightning Deal"), 0.0);
        assert_eq!(discount_percentage(""), 0.0);
    }

    #[test]
    fn test_parse_rating_patterns() {
        assert_eq!(parse_rating("4.5 out of 5 stars"), 4.5);
        assert_eq!(parse_rating("4 stars"), 4.0);
        assert_eq!(parse_rating("3.8/5"), 3.8);
        assert_eq!(parse_rating("Rating: 4.2"), 4.2);
        assert_eq!(parse_rating("4.7"), 4.7);
    }

    #[test]
    fn test_parse_rating_out_of_range_skipped() {
        // "9.9" fails the bounds check; nothing else matches
        assert_eq!(parse_rating("9.9"), 0.0);
        assert_eq!(parse_rating("no rating here"), 0.0);
    }

    #[test]
    fn test_parse_rating_first_valid_pattern_wins() {
        // "out of" pattern matches 4.1 before the bare-number pattern sees 128
        assert_eq!(parse_rating("4.1 out of 5, 128 ratings"), 4.1);
    }

    #[test]
    fn test_parse_review_count() {
        assert_eq!(parse_review_count("1,234"), 1234);
        assert_eq!(parse_review_count("1.2k"), 1200);
        assert_eq!(parse_review_count("15K ratings"), 15000);
        assert_eq!(parse_review_count("89"), 89);
        assert_eq!(parse_review_count("no reviews"), 0);
        assert_eq!(parse_review_count(""), 0);
    }

    #[test]
    fn test_normalize_image_url() {
        assert_eq!(
            normalize_image_url("https://images-na.ssl-images-amazon.com/images/I/71abc._AC_UL320_.jpg"),
            "https://images-na.ssl-images-amazon.com/images/I/71abc.jpg"
        );
        // untouched when no size token is embedded
        assert_eq!(
            normalize_image_url("https://images-na.ssl-images-amazon.com/images/I/71abc.jpg"),
            "https://images-na.ssl-images-amazon.com/images/I/71abc.jpg"
        );
    }

    #[test]
    fn test_cap_description() {
        let long = "x".repeat(400);
        assert_eq!(cap_description(&long).chars().count(), MAX_DESCRIPTION_CHARS);
        assert_eq!(cap_description("short"), "short");
    }
}
