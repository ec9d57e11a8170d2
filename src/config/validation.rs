use crate::config::types::{Config, CrawlerConfig, OverlayConfig, ScoringConfig, TargetConfig};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_crawler_config(&config.crawler)?;
    validate_scoring_config(&config.scoring)?;
    validate_output_config(&config.output)?;
    validate_overlay_config(&config.overlay)?;
    Ok(())
}

/// Validates profile and single-post URLs when present
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("profile_url", &config.profile_url),
        ("single_url", &config.single_url),
    ] {
        if let Some(raw) = value {
            let url = Url::parse(raw)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "{} must use http or https, got '{}'",
                    name, raw
                )));
            }
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_posts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_posts must be >= 1, got {}",
            config.max_posts
        )));
    }

    if config.link_iterations < 1 || config.comment_cycles < 1 {
        return Err(ConfigError::Validation(
            "link_iterations and comment_cycles must be >= 1".to_string(),
        ));
    }

    if config.navigation_timeout_ms < 1_000 {
        return Err(ConfigError::Validation(format!(
            "navigation_timeout must be >= 1000ms, got {}ms",
            config.navigation_timeout_ms
        )));
    }

    if config.politeness_min_ms > config.politeness_max_ms {
        return Err(ConfigError::Validation(format!(
            "politeness_min ({}ms) exceeds politeness_max ({}ms)",
            config.politeness_min_ms, config.politeness_max_ms
        )));
    }

    if config.region_hint.is_empty() || !config.region_hint.chars().all(|c| c.is_alphanumeric()) {
        return Err(ConfigError::Validation(format!(
            "region_hint must be a non-empty alphanumeric code, got '{}'",
            config.region_hint
        )));
    }

    Ok(())
}

/// Validates scoring thresholds and model settings
fn validate_scoring_config(config: &ScoringConfig) -> Result<(), ConfigError> {
    if !config.rule_threshold.is_finite() || config.rule_threshold < 0.0 {
        return Err(ConfigError::Validation(format!(
            "rule_threshold must be a non-negative number, got {}",
            config.rule_threshold
        )));
    }

    if !config.toxic_threshold.is_finite() || !(0.0..=1.0).contains(&config.toxic_threshold) {
        return Err(ConfigError::Validation(format!(
            "toxic_threshold must be between 0 and 1, got {}",
            config.toxic_threshold
        )));
    }

    // A missing model URL is allowed; scoring falls back to rules only
    if let Some(url) = config.model_url.as_deref() {
        Url::parse(url).map_err(|e| ConfigError::InvalidUrl(format!("Invalid model_url: {}", e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.debug_dir.is_empty() {
        return Err(ConfigError::Validation("debug_dir cannot be empty".to_string()));
    }

    Ok(())
}

/// Validates overlay patterns and the full-screen heuristic bounds
fn validate_overlay_config(config: &OverlayConfig) -> Result<(), ConfigError> {
    for pattern in &config.block_patterns {
        Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
    }

    if !(0.0..=1.0).contains(&config.coverage) {
        return Err(ConfigError::Validation(format!(
            "coverage must be between 0 and 1, got {}",
            config.coverage
        )));
    }

    Ok(())
}
