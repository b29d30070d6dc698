//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use regex::Regex;
use thiserror::Error;

use crate::config::AppConfig;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `request_timeout_ms` or `validation_timeout_ms` is out of [100ms, 5min]
    /// - `user_agent` is empty
    /// - `max_retries` is 0 (at least one attempt is required)
    /// - `validation_concurrency` is 0
    /// - `sources` or `marketplace_domains` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in
            [("request_timeout_ms", self.request_timeout_ms), ("validation_timeout_ms", self.validation_timeout_ms)]
        {
            if value < 100 {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 100ms".into() });
            }
            if value > 300_000 {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must not exceed 5 minutes (300000ms)".into(),
                });
            }
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.max_retries == 0 {
            return Err(ConfigError::Invalid { field: "max_retries".into(), reason: "must be at least 1".into() });
        }

        if self.validation_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "validation_concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.sources.is_empty() {
            return Err(ConfigError::Invalid { field: "sources".into(), reason: "must not be empty".into() });
        }

        if self.marketplace_domains.is_empty() {
            return Err(ConfigError::Invalid {
                field: "marketplace_domains".into(),
                reason: "must not be empty".into(),
            });
        }

        // Associates tags are 10-20 chars of alphanumerics and hyphens. A
        // malformed tag still produces working (untagged-revenue) links, so
        // this only warns.
        if let Some(tag) = &self.affiliate_tag {
            let shape = Regex::new(r"^[a-zA-Z0-9-]{10,20}$").expect("invalid regex");
            if !shape.is_match(tag) {
                tracing::warn!(%tag, "affiliate tag format may be invalid");
            }
        }

        Ok(())
    }
}
