//! Quality filtering and scoring for deduplicated candidates.
//!
//! ### Tier ladder
//! Tiers are evaluated strictly in order; the first tier with a non-empty
//! yield wins, and an empty final result is a legitimate outcome, never an
//! error. Records are filtered, never fabricated.
//!
//! ### Scoring
//! A score is the sum of independent capped components: discount (up to 50),
//! rating band (up to 30), review-count band (up to 20), freshness (up to
//! 10), badge bonus (5). Ranking is a stable descending sort, so equal
//! scores keep their pre-sort order.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use dealharvest_core::{Product, QualityThresholds};

use crate::extract::discount_percentage;

/// Which tier of the relaxation ladder produced the run's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    Strict,
    Relaxed,
    LastResort,
    Empty,
}

/// Apply the tiered relaxation ladder to deduplicated candidates.
///
/// Returns the surviving records along with the tier that produced them.
pub fn filter_by_quality(deals: &[Product], thresholds: &QualityThresholds) -> (Vec<Product>, QualityTier) {
    let strict: Vec<Product> = deals
        .iter()
        .filter(|deal| {
            discount_percentage(&deal.discount) >= thresholds.strict_discount
                && deal.rating >= thresholds.strict_rating
                && deal.review_count >= thresholds.strict_reviews
        })
        .cloned()
        .collect();
    if !strict.is_empty() {
        return (strict, QualityTier::Strict);
    }

    tracing::warn!("no deals met strict quality criteria; relaxing filters");
    let relaxed: Vec<Product> = deals
        .iter()
        .filter(|deal| {
            let pct = discount_percentage(&deal.discount);
            (pct >= thresholds.relaxed_discount
                && deal.rating >= thresholds.relaxed_rating
                && deal.review_count >= thresholds.relaxed_reviews)
                || (deal.rating >= thresholds.relaxed_alt_rating && deal.review_count >= thresholds.relaxed_alt_reviews)
        })
        .cloned()
        .collect();
    if !relaxed.is_empty() {
        return (relaxed, QualityTier::Relaxed);
    }

    tracing::warn!("no deals met relaxed criteria; keeping anything with a legitimacy signal");
    let last_resort: Vec<Product> = deals
        .iter()
        .filter(|deal| deal.rating > 0.0 || deal.review_count > 0)
        .cloned()
        .collect();
    if !last_resort.is_empty() {
        return (last_resort, QualityTier::LastResort);
    }

    (Vec::new(), QualityTier::Empty)
}

/// Compute the desirability score for one candidate.
///
/// Components: discount `min(pct * 2, 50)`, rating band (30/20/10),
/// review-count band (20/15/10/5), freshness bonus (10/7/5, only for ASINs
/// already in the first-seen map), badge bonus (+5 for "lightning"/"limited").
pub fn score_deal(deal: &Product, first_seen: &HashMap<String, DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let mut score = 0.0;

    score += (discount_percentage(&deal.discount) * 2.0).min(50.0);

    score += if deal.rating >= 4.5 {
        30.0
    } else if deal.rating >= 4.0 {
        20.0
    } else if deal.rating >= 3.5 {
        10.0
    } else {
        0.0
    };

    score += if deal.review_count >= 1000 {
        20.0
    } else if deal.review_count >= 500 {
        15.0
    } else if deal.review_count >= 100 {
        10.0
    } else if deal.review_count >= 50 {
        5.0
    } else {
        0.0
    };

    if let Some(seen_at) = first_seen.get(&deal.asin) {
        let age = now - *seen_at;
        score += if age < Duration::hours(1) {
            10.0
        } else if age < Duration::hours(6) {
            7.0
        } else if age < Duration::hours(24) {
            5.0
        } else {
            0.0
        };
    }

    let discount_lower = deal.discount.to_lowercase();
    if discount_lower.contains("lightning") || discount_lower.contains("limited") {
        score += 5.0;
    }

    score
}

/// Rank candidates descending by score with a stable sort.
pub fn rank_deals(deals: Vec<Product>, first_seen: &HashMap<String, DateTime<Utc>>) -> Vec<Product> {
    let now = Utc::now();
    let mut scored: Vec<(Product, f64)> = deals
        .into_iter()
        .map(|deal| {
            let score = score_deal(&deal, first_seen, now);
            (deal, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored.into_iter().map(|(deal, _)| deal).collect()
}
