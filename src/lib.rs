//! Rank-Tracker: keyword rank history for tracked shopping products
//!
//! This crate queries a paginated shopping search API for each tracked
//! (product id, keyword) pair, works out the product's organic rank, and
//! appends the result to a per-product rank sheet.

pub mod config;
pub mod crawler;
pub mod output;
pub mod rank;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Rank-Tracker operations
#[derive(Debug, Error)]
pub enum RankError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Failed to persist rank batch for sheet '{group_key}': {source}")]
    Sink {
        group_key: String,
        source: storage::StorageError,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid crawl state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlState,
        to: state::CrawlState,
    },

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

/// Result type alias for Rank-Tracker operations
pub type Result<T> = std::result::Result<T, RankError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use rank::{ProductId, Rank, RankBatch, RankUpdate, RankedRecord};
pub use state::CrawlState;
