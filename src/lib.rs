//! Comment Sentry: harvests comments from social-media posts and flags abuse
//!
//! This crate drives a real browser session against pages that actively
//! resist automation (app-wall overlays, infinite scroll, unstable markup),
//! extracts the comments it can reach and scores each one for toxicity.

pub mod browser;
pub mod comment;
pub mod config;
pub mod crawler;
pub mod harvest;
pub mod output;
pub mod scoring;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Comment Sentry operations
///
/// Only setup failures surface through this type. Page-level trouble
/// (missing selectors, read timeouts, empty feeds) is absorbed by the
/// harvesting layers and reported as partial or empty results.
#[derive(Debug, Error)]
pub enum SentryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::DriverError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Toxicity model error: {0}")]
    Model(#[from] scoring::ModelError),
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

    #[error("Invalid block pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Comment Sentry operations
pub type Result<T> = std::result::Result<T, SentryError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use comment::{comment_id, RawComment, ScoredComment};
pub use config::Config;
pub use crawler::{CrawlOrchestrator, CrawlReport};
pub use state::CrawlState;
pub use url::{normalize_post_url, PostReference};
