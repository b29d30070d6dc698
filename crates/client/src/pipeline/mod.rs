//! Deal ingestion pipeline: fetch, extract, deduplicate, filter, rank.
//!
//! Sources are fetched sequentially with a pacing delay between them; a
//! failed source is logged and skipped, never fatal. All sources' candidates
//! flow through one deduplication pass, the tiered quality filter, and the
//! scorer. The public entry points never return errors: an empty list is a
//! legitimate terminal outcome of a run.

pub mod quality;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use scraper::Html;

use dealharvest_core::models::PRICE_NOT_AVAILABLE;
use dealharvest_core::{AppConfig, Category, Error, Product, asin_from_url};

use crate::extract::{self, clean_discount, clean_price, extract_deals};
use crate::fetch::FetchClient;
use crate::validate::is_marketplace_url;

pub use quality::{QualityTier, filter_by_quality, rank_deals, score_deal};

/// Deduplicate candidates by ASIN, preserving first-occurrence order.
///
/// Every kept candidate not already in `first_seen` is recorded at `now`;
/// existing entries are never overwritten.
pub fn dedupe(deals: Vec<Product>, first_seen: &mut HashMap<String, DateTime<Utc>>, now: DateTime<Utc>) -> Vec<Product> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::new();

    for deal in deals {
        if deal.asin.is_empty() || seen.contains(&deal.asin) {
            continue;
        }
        seen.insert(deal.asin.clone());
        first_seen.entry(deal.asin.clone()).or_insert(now);
        unique.push(deal);
    }

    unique
}

/// The ingestion-and-qualification pipeline.
///
/// Owns the fetch client's connection pool and the first-seen map. The map is
/// append-only for the lifetime of the pipeline instance; entries are only
/// read for freshness scoring.
pub struct DealPipeline {
    fetcher: FetchClient,
    config: AppConfig,
    first_seen: HashMap<String, DateTime<Utc>>,
}

impl DealPipeline {
    /// Create a pipeline from application configuration.
    pub fn new(config: AppConfig) -> Result<Self, Error> {
        let fetcher = FetchClient::new(config.clone())?;
        Ok(Self { fetcher, config, first_seen: HashMap::new() })
    }

    /// Run one full ingestion pass and return the ranked deal list.
    ///
    /// Never errors; all degradations are logged. The result is capped at
    /// `max_deals_per_source * sources.len()`.
    pub async fn run(&mut self) -> Vec<Product> {
        let sources = self.config.sources.clone();
        let mut all_deals = Vec::new();

        for (index, source) in sources.iter().enumerate() {
            match self.fetcher.fetch_source(source).await {
                Ok(html) => {
                    let deals = extract_deals(&html, source, self.config.max_deals_per_source * 2);
                    tracing::info!(%source, count = deals.len(), "source scraped");
                    all_deals.extend(deals);
                }
                Err(e) => {
                    tracing::warn!(%source, error = %e, "source skipped for this run");
                }
            }

            if index + 1 < sources.len() {
                tokio::time::sleep(self.config.rate_limit_delay()).await;
            }
        }

        let unique = dedupe(all_deals, &mut self.first_seen, Utc::now());
        tracing::info!(count = unique.len(), "unique deals after dedup");

        if unique.is_empty() {
            tracing::warn!("no deals scraped; markup change or rate limiting likely");
            return Vec::new();
        }

        let (filtered, tier) = filter_by_quality(&unique, &self.config.thresholds);
        tracing::info!(count = filtered.len(), ?tier, "deals after quality filter");

        if filtered.is_empty() {
            return Vec::new();
        }

        let mut ranked = rank_deals(filtered, &self.first_seen);
        ranked.truncate(self.config.max_deals_per_source * sources.len());

        tracing::info!(count = ranked.len(), "returning top-scored deals");
        ranked
    }

    /// Search the marketplace for products matching a keyword.
    ///
    /// At most `max_results` extracted candidates are considered; those
    /// meeting the rating and review floors are returned in extraction order.
    /// An empty keyword or a failed fetch yields an empty list.
    pub async fn search_products(
        &self,
        keyword: &str,
        max_results: usize,
        min_rating: f64,
        min_reviews: u32,
    ) -> Vec<Product> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            tracing::warn!("empty search keyword");
            return Vec::new();
        }

        let mut search_url = format!("https://www.amazon.com/s?k={}", keyword.replace(' ', "+"));
        if let Some(tag) = &self.config.affiliate_tag {
            search_url.push_str(&format!("&tag={tag}"));
        }

        tracing::info!(keyword, "searching marketplace");
        let html = match self.fetcher.fetch_source(&search_url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(keyword, error = %e, "search fetch failed");
                return Vec::new();
            }
        };

        let found: Vec<Product> = extract_deals(&html, &search_url, max_results)
            .into_iter()
            .filter(|p| p.rating >= min_rating && p.review_count >= min_reviews)
            .collect();

        tracing::info!(keyword, count = found.len(), "quality products found");
        found
    }

    /// Fetch the featured deal from the deal-of-the-day pages.
    ///
    /// Pages are tried in order; the first extracted candidate wins. `None`
    /// when every page fails or yields nothing.
    pub async fn deal_of_the_day(&self) -> Option<Product> {
        let pages = ["https://www.amazon.com/gp/goldbox/ref=nav_cs_gb_azl", "https://www.amazon.com/gp/goldbox"];

        for page in pages {
            let url = match &self.config.affiliate_tag {
                Some(tag) => {
                    let separator = if page.contains('?') { '&' } else { '?' };
                    format!("{page}{separator}tag={tag}")
                }
                None => page.to_string(),
            };

            match self.fetcher.fetch_source(&url).await {
                Ok(html) => {
                    let mut deals = extract_deals(&html, &url, self.config.max_deals_per_source * 2);
                    if !deals.is_empty() {
                        let deal = deals.remove(0);
                        tracing::info!(asin = %deal.asin, "deal of the day found");
                        return Some(deal);
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "deal-of-the-day page failed");
                }
            }
        }

        tracing::warn!("no deal of the day found");
        None
    }

    /// Scrape one specific product page by URL.
    ///
    /// Returns `None` for malformed or non-marketplace URLs and on any fetch
    /// or extraction failure.
    pub async fn scrape_product(&self, url: &str) -> Option<Product> {
        let sanitized = match crate::fetch::sanitize(url) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(url, error = %e, "rejected product URL");
                return None;
            }
        };

        if !is_marketplace_url(&sanitized, &self.config.marketplace_domains) {
            tracing::warn!(url, "not a marketplace URL");
            return None;
        }

        let html = match self.fetcher.fetch_source(sanitized.as_str()).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url, error = %e, "product page fetch failed");
                return None;
            }
        };

        let asin = asin_from_url(sanitized.as_str())?;
        let document = Html::parse_document(&html);
        let root = document.root_element();

        let title = extract::first_text(root, &[".product-title", "h1.a-size-large"])?;
        let price = extract::first_text(root, &[".a-price-whole", ".a-price .a-offscreen"]);
        let discount = extract::first_text(root, &[".savingsPercentage", ".a-badge-text"]);

        Some(Product {
            category: Category::from_title(&title),
            link: sanitized.to_string(),
            price: price.map(|p| clean_price(&p)).unwrap_or_else(|| PRICE_NOT_AVAILABLE.into()),
            discount: discount.map(|d| clean_discount(&d)).unwrap_or_default(),
            title,
            asin,
            rating: 0.0,
            review_count: 0,
            description: String::new(),
            image_url: String::new(),
        })
    }

    /// Read-only view of the first-seen map.
    pub fn first_seen(&self) -> &HashMap<String, DateTime<Utc>> {
        &self.first_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal(asin: &str) -> Product {
        Product {
            title: format!("Test Product {asin}"),
            price: "$9.99".into(),
            discount: String::new(),
            link: format!("https://www.amazon.com/dp/{asin}"),
            asin: asin.into(),
            category: Category::General,
            rating: 0.0,
            review_count: 0,
            description: String::new(),
            image_url: String::new(),
        }
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let deals = vec![deal("B000000001"), deal("B000000002"), deal("B000000001"), deal("B000000003")];
        let mut first_seen = HashMap::new();

        let unique = dedupe(deals, &mut first_seen, Utc::now());
        let order: Vec<&str> = unique.iter().map(|d| d.asin.as_str()).collect();
        assert_eq!(order, ["B000000001", "B000000002", "B000000003"]);
    }

    #[test]
    fn test_dedupe_idempotent() {
        let deals = vec![deal("B000000001"), deal("B000000002")];
        let mut first_seen = HashMap::new();

        let once = dedupe(deals, &mut first_seen, Utc::now());
        let twice = dedupe(once.clone(), &mut first_seen, Utc::now());

        let a: Vec<&str> = once.iter().map(|d| d.asin.as_str()).collect();
        let b: Vec<&str> = twice.iter().map(|d| d.asin.as_str()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dedupe_records_first_seen_once() {
        let mut first_seen = HashMap::new();
        let early = Utc::now() - chrono::Duration::hours(2);

        dedupe(vec![deal("B000000001")], &mut first_seen, early);
        dedupe(vec![deal("B000000001")], &mut first_seen, Utc::now());

        // timestamp from the first sighting is never overwritten
        assert_eq!(first_seen.get("B000000001"), Some(&early));
        assert_eq!(first_seen.len(), 1);
    }

    #[test]
    fn test_dedupe_drops_empty_asin() {
        let mut anonymous = deal("B000000001");
        anonymous.asin = String::new();
        let mut first_seen = HashMap::new();

        let unique = dedupe(vec![anonymous], &mut first_seen, Utc::now());
        assert!(unique.is_empty());
        assert!(first_seen.is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_new() {
        let pipeline = DealPipeline::new(AppConfig::default());
        assert!(pipeline.is_ok());
    }

    #[tokio::test]
    async fn test_search_products_empty_keyword() {
        let pipeline = DealPipeline::new(AppConfig::default()).unwrap();
        assert!(pipeline.search_products("", 20, 4.0, 50).await.is_empty());
        assert!(pipeline.search_products("   ", 20, 4.0, 50).await.is_empty());
    }

    #[tokio::test]
    async fn test_scrape_product_rejects_foreign_domain() {
        let pipeline = DealPipeline::new(AppConfig::default()).unwrap();
        let result = pipeline.scrape_product("https://example.com/dp/B000000001").await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_scrape_product_rejects_script_scheme() {
        let pipeline = DealPipeline::new(AppConfig::default()).unwrap();
        let result = pipeline.scrape_product("javascript:alert(1)").await;
        assert!(result.is_none());
    }
}
