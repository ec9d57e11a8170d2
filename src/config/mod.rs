//! Configuration module for Comment Sentry
//!
//! Configuration is layered: built-in defaults, an optional TOML file,
//! the environment (including a `.env` file), then CLI flags.
//!
//! # Example
//!
//! ```no_run
//! use comment_sentry::config::load_layered_config;
//!
//! let config = load_layered_config(None).unwrap();
//! println!("Harvesting up to {} posts", config.crawler.max_posts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlerConfig, OutputConfig, OverlayConfig, ScoringConfig,
    TargetConfig,
};

// Re-export parser functions
pub use parser::{apply_env_overrides, load_config, load_layered_config, parse_bool};
pub use validation::validate;
