use serde::Deserialize;

/// Main configuration structure for Comment Sentry
///
/// Every section has defaults, so an empty TOML file (or no file at all)
/// yields a usable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub crawler: CrawlerConfig,
    pub scoring: ScoringConfig,
    pub output: OutputConfig,
    pub browser: BrowserConfig,
    pub overlay: OverlayConfig,
}

/// What to crawl
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Profile page whose posts should be harvested
    #[serde(rename = "profile-url")]
    pub profile_url: Option<String>,

    /// A single post to harvest instead of a whole profile
    #[serde(rename = "single-url")]
    pub single_url: Option<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of posts taken from a profile
    #[serde(rename = "max-posts")]
    pub max_posts: usize,

    /// Region value appended as `region=` to post and profile URLs
    #[serde(rename = "region-hint")]
    pub region_hint: String,

    /// Page navigation timeout (milliseconds)
    #[serde(rename = "navigation-timeout")]
    pub navigation_timeout_ms: u64,

    /// Network idle wait after navigation (milliseconds)
    #[serde(rename = "idle-timeout")]
    pub idle_timeout_ms: u64,

    /// Upper bound for any single element operation (milliseconds)
    #[serde(rename = "element-timeout")]
    pub element_timeout_ms: u64,

    /// Maximum scroll iterations on a profile page
    #[serde(rename = "link-iterations")]
    pub link_iterations: u32,

    /// Consecutive no-progress iterations before link harvesting stops
    #[serde(rename = "link-stall-limit")]
    pub link_stall_limit: u32,

    /// Comment count at which loading stops
    #[serde(rename = "comment-target")]
    pub comment_target: usize,

    /// Maximum scroll cycles spent loading comments
    #[serde(rename = "comment-cycles")]
    pub comment_cycles: u32,

    /// Lower bound of the delay between post visits (milliseconds)
    #[serde(rename = "politeness-min")]
    pub politeness_min_ms: u64,

    /// Upper bound of the delay between post visits (milliseconds)
    #[serde(rename = "politeness-max")]
    pub politeness_max_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_posts: 12,
            region_hint: "US".to_string(),
            navigation_timeout_ms: 35_000,
            idle_timeout_ms: 15_000,
            element_timeout_ms: 12_000,
            link_iterations: 22,
            link_stall_limit: 3,
            comment_target: 60,
            comment_cycles: 32,
            politeness_min_ms: 600,
            politeness_max_ms: 1_200,
        }
    }
}

/// Toxicity scoring configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Whether the ML toxicity model is consulted
    #[serde(rename = "use-model")]
    pub use_model: bool,

    /// HTTP endpoint of the ML toxicity model
    #[serde(rename = "model-url")]
    pub model_url: Option<String>,

    /// Any model dimension at or above this value flags the comment
    #[serde(rename = "toxic-threshold")]
    pub toxic_threshold: f64,

    /// Rule scores at or above this value flag the comment
    #[serde(rename = "rule-threshold")]
    pub rule_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            use_model: false,
            model_url: None,
            toxic_threshold: 0.78,
            rule_threshold: 3.0,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving debug snapshots
    #[serde(rename = "debug-dir")]
    pub debug_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "comments.sqlite".to_string(),
            debug_dir: "debug".to_string(),
        }
    }
}

/// Browser launch configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Show the browser window
    pub headful: bool,

    /// DevTools websocket of an already running browser
    #[serde(rename = "chrome-url")]
    pub chrome_url: Option<String>,

    /// Browser executable to launch
    #[serde(rename = "chrome-bin")]
    pub chrome_bin: Option<String>,
}

/// App-wall suppression configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Regexes matched against lowercased request URLs; matches are aborted
    #[serde(rename = "block-patterns")]
    pub block_patterns: Vec<String>,

    /// Selectors force-hidden by the injected stylesheet
    #[serde(rename = "hide-selectors")]
    pub hide_selectors: Vec<String>,

    /// Selectors deleted by every removal pass
    #[serde(rename = "remove-selectors")]
    pub remove_selectors: Vec<String>,

    /// Minimum z-index for the full-screen overlay heuristic
    #[serde(rename = "min-z-index")]
    pub min_z_index: i64,

    /// Viewport fraction an overlay must cover in either dimension
    pub coverage: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let hide_selectors: Vec<String> = [
            ".seo-landing-modal-wrapper",
            ".seo-landing-modal-style-wrapper",
            ".ui-mobile-drawer-container",
            ".ban-banner-wrapper",
            ".bottom-reflow",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut remove_selectors = hide_selectors.clone();
        remove_selectors.extend(
            ["[class*='OpenApp']", "[data-open-app]", "div[role='dialog']"]
                .iter()
                .map(|s| s.to_string()),
        );

        Self {
            block_patterns: [
                r"/seo-landing",
                r"/openapp",
                r"/open-app",
                r"/open_in_app",
                r"/appdownload",
                r"/app-download",
                r"/install",
                r"/jump/download",
                r"tmall|appsflyer|adjust|branch\.io|smartlink|smartapp",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            hide_selectors,
            remove_selectors,
            min_z_index: 1000,
            coverage: 0.6,
        }
    }
}
