use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;
use std::str::FromStr;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use comment_sentry::config::load_config;
///
/// let config = load_config(Path::new("sentry.toml")).unwrap();
/// println!("Max posts: {}", config.crawler.max_posts);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = read_config_file(path)?;
    validate(&config)?;
    Ok(config)
}

/// Builds the effective configuration from every source
///
/// Sources are layered in this order, later ones winning: built-in
/// defaults, the optional TOML file, a `.env` file, and the process
/// environment. CLI overrides are applied by the caller afterwards, so
/// validation is left to the caller as well.
///
/// # Arguments
///
/// * `path` - Optional path to a TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - The merged configuration
/// * `Err(ConfigError)` - The file or an environment value was invalid
pub fn load_layered_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };

    // A missing .env file is the normal case
    dotenvy::dotenv().ok();

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Applies environment overrides through the given lookup function
///
/// Recognized keys: `PROFILE_URL`, `DB_PATH`, `MAX_POSTS`, `USE_DETOX`,
/// `TOXIC_THRESH`, `RULE_THRESH`, `MODEL_URL`, `CHROME_URL`, `CHROME_BIN`
/// and `DEBUG_DIR`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("PROFILE_URL") {
        config.target.profile_url = Some(url);
    }
    if let Some(path) = get("DB_PATH") {
        config.output.database_path = path;
    }
    if let Some(raw) = get("MAX_POSTS") {
        config.crawler.max_posts = parse_env("MAX_POSTS", &raw)?;
    }
    if let Some(raw) = get("USE_DETOX") {
        config.scoring.use_model = parse_bool(&raw).ok_or(ConfigError::InvalidEnv {
            key: "USE_DETOX".to_string(),
            value: raw.clone(),
        })?;
    }
    if let Some(raw) = get("TOXIC_THRESH") {
        config.scoring.toxic_threshold = parse_env("TOXIC_THRESH", &raw)?;
    }
    if let Some(raw) = get("RULE_THRESH") {
        config.scoring.rule_threshold = parse_env("RULE_THRESH", &raw)?;
    }
    if let Some(url) = get("MODEL_URL") {
        config.scoring.model_url = Some(url);
    }
    if let Some(url) = get("CHROME_URL") {
        config.browser.chrome_url = Some(url);
    }
    if let Some(bin) = get("CHROME_BIN") {
        config.browser.chrome_bin = Some(bin);
    }
    if let Some(dir) = get("DEBUG_DIR") {
        config.output.debug_dir = dir;
    }

    Ok(())
}

/// Parses a permissive boolean (`1/0`, `true/false`, `yes/no`, `on/off`)
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" => Some(true),
        "0" | "false" | "no" | "off" | "n" => Some(false),
        _ => None,
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
