//! Client code for dealharvest.
//!
//! This crate provides the HTTP fetch client, marketplace HTML extraction,
//! the ingestion pipeline (dedup, quality filter, ranking), and the
//! concurrent link validator.

pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod validate;

pub use extract::{extract_deals, extract_product};
pub use fetch::{FetchClient, UrlError, sanitize};
pub use pipeline::{DealPipeline, QualityTier, dedupe, filter_by_quality, rank_deals, score_deal};
pub use validate::{LinkValidator, is_marketplace_url, verify_affiliate_tag};
