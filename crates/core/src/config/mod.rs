//! Application configuration with layered loading.
//!
//! Configuration is assembled with figment from three sources:
//!
//! 1. Environment variables (DEALHARVEST_*)
//! 2. TOML config file (if DEALHARVEST_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Quality-filter thresholds for the tiered relaxation ladder.
///
/// These values are empirical, not invariants, so they live in configuration
/// rather than in the filter code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Strict tier: minimum discount percentage.
    pub strict_discount: f64,
    /// Strict tier: minimum star rating.
    pub strict_rating: f64,
    /// Strict tier: minimum review count.
    pub strict_reviews: u32,
    /// Relaxed tier: minimum discount percentage.
    pub relaxed_discount: f64,
    /// Relaxed tier: minimum star rating.
    pub relaxed_rating: f64,
    /// Relaxed tier: minimum review count.
    pub relaxed_reviews: u32,
    /// Relaxed tier alternative: minimum star rating with no discount requirement.
    pub relaxed_alt_rating: f64,
    /// Relaxed tier alternative: minimum review count with no discount requirement.
    pub relaxed_alt_reviews: u32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            strict_discount: 20.0,
            strict_rating: 4.0,
            strict_reviews: 50,
            relaxed_discount: 10.0,
            relaxed_rating: 3.5,
            relaxed_reviews: 10,
            relaxed_alt_rating: 4.0,
            relaxed_alt_reviews: 20,
        }
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DEALHARVEST_*)
/// 2. TOML config file (if DEALHARVEST_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// User-Agent string for HTTP requests.
    ///
    /// Defaults to a realistic desktop browser string; marketplace pages
    /// routinely serve challenge pages to obvious bot agents.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout for source fetches, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Total fetch attempts per source (first try included).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between fetch retries, in milliseconds.
    ///
    /// Doubles per retry (capped at 60s) when the source answers 429.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Pacing delay between sources within one run, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Per-source deal quota; the run returns at most
    /// `max_deals_per_source * sources.len()` records.
    #[serde(default = "default_max_deals_per_source")]
    pub max_deals_per_source: usize,

    /// Deal page sources, most deal-specific first.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    /// Affiliate tag appended to outbound links and verified by the
    /// link validator when set.
    #[serde(default)]
    pub affiliate_tag: Option<String>,

    /// Marketplace domain allow-list for link validation.
    #[serde(default = "default_marketplace_domains")]
    pub marketplace_domains: Vec<String>,

    /// Per-request timeout for link validation probes, in milliseconds.
    #[serde(default = "default_validation_timeout_ms")]
    pub validation_timeout_ms: u64,

    /// Extra validation attempts after the first on timeout/transport errors.
    #[serde(default = "default_validation_max_retries")]
    pub validation_max_retries: u32,

    /// Maximum concurrent validation probes in one batch.
    #[serde(default = "default_validation_concurrency")]
    pub validation_concurrency: usize,

    /// Quality-filter thresholds.
    #[serde(default)]
    pub thresholds: QualityThresholds,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .into()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_max_deals_per_source() -> usize {
    5
}

fn default_sources() -> Vec<String> {
    // Order matters: more specific deal pages first.
    vec![
        "https://www.amazon.com/gp/goldbox/ref=nav_cs_gb".into(),
        "https://www.amazon.com/gp/goldbox/ref=nav_cs_gb_azl".into(),
        "https://www.amazon.com/deals".into(),
        "https://www.amazon.com/gp/goldbox".into(),
        "https://www.amazon.com/s?k=deals&i=specialty-aps&ref=sr_pg_1".into(),
    ]
}

fn default_marketplace_domains() -> Vec<String> {
    vec![
        "amazon.com".into(),
        "amazon.co.uk".into(),
        "amazon.de".into(),
        "amazon.fr".into(),
        "amazon.it".into(),
        "amazon.es".into(),
        "amazon.ca".into(),
        "amazon.com.mx".into(),
        "amazon.com.br".into(),
        "amazon.in".into(),
        "amazon.co.jp".into(),
        "amazon.com.au".into(),
    ]
}

fn default_validation_timeout_ms() -> u64 {
    15_000
}

fn default_validation_max_retries() -> u32 {
    2
}

fn default_validation_concurrency() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            rate_limit_delay_ms: default_retry_delay_ms(),
            max_deals_per_source: default_max_deals_per_source(),
            sources: default_sources(),
            affiliate_tag: None,
            marketplace_domains: default_marketplace_domains(),
            validation_timeout_ms: default_validation_timeout_ms(),
            validation_max_retries: default_validation_max_retries(),
            validation_concurrency: default_validation_concurrency(),
            thresholds: QualityThresholds::default(),
        }
    }
}

impl AppConfig {
    /// Request timeout as a Duration for use with reqwest/tokio.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Retry base delay as a Duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Between-source pacing delay as a Duration.
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// Validation probe timeout as a Duration.
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config file cannot be read, environment
    /// variables cannot be parsed, or validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("DEALHARVEST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DEALHARVEST_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
