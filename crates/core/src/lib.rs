//! Core types and shared functionality for dealharvest.
//!
//! This crate provides:
//! - Candidate and validation data models
//! - Unified error types
//! - Layered configuration
//! - Outbound product link construction

pub mod config;
pub mod error;
pub mod links;
pub mod models;

pub use config::{AppConfig, ConfigError, QualityThresholds};
pub use error::Error;
pub use links::{affiliate_link, asin_from_url, product_link};
pub use models::{Category, LinkValidationResult, Product, ValidationStats, is_valid_asin};
