//! Dealsweep: an incremental hot-deal harvester
//!
//! This crate crawls a small, fixed set of community deal boards, normalizes
//! listings into a common record shape, and persists only genuinely new items
//! while keeping each source's storage footprint bounded.

pub mod adapter;
pub mod config;
pub mod deal;
pub mod dedup;
pub mod fetch;
pub mod harvest;
pub mod retention;
pub mod store;

use thiserror::Error;

/// Main error type for dealsweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed for {url} after {attempts} attempts: {last_error}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Adapter error in source '{source_name}': {message}")]
    Adapter { source_name: String, message: String },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Unparsable posted time '{raw}' (format hint '{hint}')")]
    DateParse { raw: String, hint: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for dealsweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use adapter::{CrawlOutcome, SourceAdapter};
pub use config::Config;
pub use deal::Deal;
pub use harvest::{Harvester, RunReport};
