//! Comment Sentry main entry point
//!
//! This is the command-line interface for the Comment Sentry harvester.

use anyhow::Context;
use clap::Parser;
use comment_sentry::browser::ChromiumBrowser;
use comment_sentry::config::{load_layered_config, validate, Config};
use comment_sentry::crawler::{CrawlOrchestrator, CrawlReport};
use comment_sentry::output::{load_statistics, print_run_summary, print_statistics};
use comment_sentry::scoring::ScoringPipeline;
use comment_sentry::storage::{open_store, CommentStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exit code when no crawl target was supplied
const EXIT_NO_TARGET: i32 = 3;

/// Comment Sentry: harvests post comments and flags abusive ones
///
/// Comment Sentry drives a real browser through a profile's posts (or a
/// single post), loads as many comments as the page will give up, scores
/// each for toxicity and stores the results in SQLite.
#[derive(Parser, Debug)]
#[command(name = "comment-sentry")]
#[command(version)]
#[command(about = "Harvests post comments and flags abusive ones", long_about = None)]
struct Cli {
    /// Profile page whose posts should be harvested
    #[arg(long, value_name = "URL")]
    profile_url: Option<String>,

    /// Harvest a single post instead of a whole profile
    #[arg(long, value_name = "URL")]
    single_url: Option<String>,

    /// Maximum number of posts taken from the profile
    #[arg(long, value_name = "N")]
    max_posts: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Path to TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print the resolved configuration and exit
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration first: the .env file may carry LOG_LEVEL
    let config = load_layered_config(cli.config.as_deref());
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match config {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    apply_cli_overrides(&mut config, &cli);
    validate(&config).context("Invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }
    if cli.stats {
        return handle_stats(&config);
    }

    let target = match (&config.target.single_url, &config.target.profile_url) {
        (Some(url), _) => Target::Post(url.clone()),
        (None, Some(url)) => Target::Profile(url.clone()),
        (None, None) => {
            tracing::error!(
                "Nothing to crawl: pass --profile-url or --single-url (or set PROFILE_URL)"
            );
            std::process::exit(EXIT_NO_TARGET);
        }
    };

    handle_crawl(config, target).await
}

/// What a run crawls
enum Target {
    Profile(String),
    Post(String),
}

/// Sets up the logging/tracing subscriber
///
/// `LOG_LEVEL` sets the base level; `-v` flags raise it for this crate.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        let base = std::env::var("LOG_LEVEL")
            .ok()
            .filter(|level| !level.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());
        match verbose {
            0 => EnvFilter::new(format!("warn,comment_sentry={}", base)),
            1 => EnvFilter::new("comment_sentry=debug,info"),
            2 => EnvFilter::new("comment_sentry=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line flags on top of the layered configuration
fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.profile_url {
        config.target.profile_url = Some(url.clone());
    }
    if let Some(url) = &cli.single_url {
        config.target.single_url = Some(url.clone());
    }
    if let Some(max) = cli.max_posts {
        config.crawler.max_posts = max;
    }
    if cli.headful {
        config.browser.headful = true;
    }
}

/// Handles the --dry-run mode: shows the resolved configuration
fn handle_dry_run(config: &Config) {
    println!("=== Comment Sentry Dry Run ===\n");

    println!("Target:");
    match (&config.target.single_url, &config.target.profile_url) {
        (Some(url), _) => println!("  Single post: {}", url),
        (None, Some(url)) => println!("  Profile: {}", url),
        (None, None) => println!("  (none)"),
    }

    println!("\nCrawler:");
    println!("  Max posts: {}", config.crawler.max_posts);
    println!("  Region hint: {}", config.crawler.region_hint);
    println!(
        "  Navigation timeout: {}ms",
        config.crawler.navigation_timeout_ms
    );
    println!("  Comment target: {}", config.crawler.comment_target);
    println!(
        "  Politeness: {}-{}ms",
        config.crawler.politeness_min_ms, config.crawler.politeness_max_ms
    );

    println!("\nScoring:");
    println!("  Rule threshold: {}", config.scoring.rule_threshold);
    println!("  Toxicity threshold: {}", config.scoring.toxic_threshold);
    match (&config.scoring.model_url, config.scoring.use_model) {
        (Some(url), true) => println!("  Model: {}", url),
        _ => println!("  Model: disabled"),
    }

    println!("\nBrowser:");
    match &config.browser.chrome_url {
        Some(url) => println!("  Connect: {}", url),
        None => println!(
            "  Launch: {}",
            if config.browser.headful { "headful" } else { "headless" }
        ),
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Debug snapshots: {}", config.output.debug_dir);
    println!("\nOverlay block patterns: {}", config.overlay.block_patterns.len());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))
        .context("Failed to open comment store")?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, target: Target) -> anyhow::Result<()> {
    // Open the store before launching anything expensive
    let mut store = open_store(Path::new(&config.output.database_path))
        .context("Failed to open comment store")?;

    let scoring = ScoringPipeline::from_config(&config.scoring)?;
    if !scoring.has_model() {
        tracing::info!("Scoring with rules only");
    }

    let browser = Arc::new(
        ChromiumBrowser::start(&config.browser)
            .await
            .context("Failed to start browser")?,
    );
    let orchestrator = CrawlOrchestrator::new(Arc::clone(&browser), &config, scoring)?;

    let report: CrawlReport = match &target {
        Target::Post(url) => orchestrator.crawl_single(url).await?,
        Target::Profile(url) => orchestrator.crawl_profile(url).await?,
    };

    let stored = if report.is_empty() {
        tracing::warn!("No comments harvested from {}", report.target);
        0
    } else {
        store.upsert(&report.rows)?
    };
    tracing::info!(
        "Stored {} comments ({} flagged)",
        stored,
        report.flagged_count()
    );

    print_run_summary(&report, stored);
    Ok(())
}
