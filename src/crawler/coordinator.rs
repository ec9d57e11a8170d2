//! Crawl orchestrator - top-level harvesting state machine
//!
//! This module composes the harvesting layers into the two crawl modes:
//! - Profile: navigate, harvest post links, then visit each post in turn
//! - Single post: navigate, load comments, extract, score
//!
//! Every attempt runs inside its own device context. An attempt that
//! yields nothing under the mobile profile is repeated once under the
//! desktop profile; if that also yields nothing a debug snapshot is taken
//! and an empty result is returned.

use crate::browser::{BrowserDriver, DeviceProfile, DeviceProfileManager, PageDriver};
use crate::comment::ScoredComment;
use crate::config::{Config, CrawlerConfig};
use crate::crawler::debug::DebugSink;
use crate::crawler::{CrawlReport, PostReport};
use crate::harvest::{CommentExtractor, CommentLoader, Extraction, LinkHarvester, OverlaySuppressor};
use crate::scoring::ScoringPipeline;
use crate::state::{CrawlState, StateTrail};
use crate::url::{normalize_post_url, with_region_hint, PostReference};
use crate::{ConfigResult, Result};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Settle delay after a profile page loads (milliseconds)
const PROFILE_SETTLE_MS: (u64, u64) = (400, 1_000);

/// Randomized delays between page visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Politeness {
    /// After a profile page loads, before harvesting
    pub after_profile: (Duration, Duration),

    /// Between two consecutive post visits
    pub between_posts: (Duration, Duration),
}

impl Politeness {
    /// No delays at all
    pub fn none() -> Self {
        Self {
            after_profile: (Duration::ZERO, Duration::ZERO),
            between_posts: (Duration::ZERO, Duration::ZERO),
        }
    }

    /// Delays from the crawler configuration
    ///
    /// A zero `politeness-max` disables both delays.
    pub fn from_config(config: &CrawlerConfig) -> Self {
        if config.politeness_max_ms == 0 {
            return Self::none();
        }
        Self {
            after_profile: (
                Duration::from_millis(PROFILE_SETTLE_MS.0),
                Duration::from_millis(PROFILE_SETTLE_MS.1),
            ),
            between_posts: (
                Duration::from_millis(config.politeness_min_ms),
                Duration::from_millis(config.politeness_max_ms),
            ),
        }
    }
}

/// Picks a delay uniformly from `[min, max]`
fn jitter((min, max): (Duration, Duration)) -> Duration {
    if max <= min {
        return min;
    }
    let ms = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(ms)
}

async fn pause(range: (Duration, Duration)) {
    let delay = jitter(range);
    if !delay.is_zero() {
        tracing::debug!("Politeness delay {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}

/// Main crawl orchestrator
pub struct CrawlOrchestrator<B: BrowserDriver> {
    devices: DeviceProfileManager<B>,
    suppressor: OverlaySuppressor,
    links: LinkHarvester,
    loader: CommentLoader,
    extractor: CommentExtractor,
    scoring: ScoringPipeline,
    debug: DebugSink,
    politeness: Politeness,
    max_posts: usize,
    region: String,
    navigation_timeout: Duration,
    idle_timeout: Duration,
}

impl<B: BrowserDriver> CrawlOrchestrator<B> {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `browser` - The browser that hands out device contexts
    /// * `config` - The resolved configuration
    /// * `scoring` - The scoring pipeline applied to every post
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOrchestrator)` - Ready to crawl
    /// * `Err(ConfigError)` - The overlay configuration is invalid
    pub fn new(browser: Arc<B>, config: &Config, scoring: ScoringPipeline) -> ConfigResult<Self> {
        let suppressor = OverlaySuppressor::new(&config.overlay)?;
        let crawler = &config.crawler;

        Ok(Self {
            devices: DeviceProfileManager::new(browser),
            links: LinkHarvester::new(suppressor.clone(), crawler),
            loader: CommentLoader::new(suppressor.clone(), crawler),
            extractor: CommentExtractor::new(),
            suppressor,
            scoring,
            debug: DebugSink::new(&config.output.debug_dir),
            politeness: Politeness::from_config(crawler),
            max_posts: crawler.max_posts,
            region: crawler.region_hint.clone(),
            navigation_timeout: Duration::from_millis(crawler.navigation_timeout_ms),
            idle_timeout: Duration::from_millis(crawler.idle_timeout_ms),
        })
    }

    /// Replaces the politeness delays
    pub fn with_politeness(mut self, politeness: Politeness) -> Self {
        self.politeness = politeness;
        self
    }

    // ===== Profile Mode =====

    /// Harvests every reachable post of a profile and scores its comments
    ///
    /// # Arguments
    ///
    /// * `profile_url` - The profile page
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Scored rows, possibly empty
    /// * `Err(SentryError)` - A browsing context could not be created
    pub async fn crawl_profile(&self, profile_url: &str) -> Result<CrawlReport> {
        tracing::info!("Crawling profile {}", profile_url);
        let mut trail = StateTrail::new();
        let mut posts = Vec::new();

        for (attempt, profile) in DeviceProfile::FALLBACK_CHAIN.into_iter().enumerate() {
            let is_last = attempt + 1 == DeviceProfile::FALLBACK_CHAIN.len();
            if attempt > 0 {
                tracing::warn!("No post links under the default profile, retrying as {}", profile);
                trail.advance(CrawlState::ErrorFallback);
                trail.advance(CrawlState::Start);
            }

            let trail_ref = &mut trail;
            posts = self
                .devices
                .with_context(profile, |page| async move {
                    self.profile_attempt(page.as_ref(), profile_url, is_last, trail_ref)
                        .await
                })
                .await?;

            if !posts.is_empty() {
                break;
            }
        }

        let mut report = CrawlReport::new(profile_url);
        if posts.is_empty() {
            tracing::warn!("No post links found on {}", profile_url);
            trail.advance(CrawlState::Failed);
            report.trail = trail;
            return Ok(report);
        }

        trail.advance(CrawlState::VisitPosts);
        tracing::info!("Visiting {} posts", posts.len());

        for (index, post) in posts.iter().enumerate() {
            if index > 0 {
                pause(self.politeness.between_posts).await;
            }
            let (summary, rows) = self.visit_post(&post.url).await?;
            report.push(summary, rows);
        }

        trail.advance(CrawlState::Done);
        report.trail = trail;
        tracing::info!(
            "Profile crawl finished: {} comments from {} posts",
            report.rows.len(),
            report.posts.len()
        );
        Ok(report)
    }

    async fn profile_attempt(
        &self,
        page: &B::Page,
        profile_url: &str,
        is_last: bool,
        trail: &mut StateTrail,
    ) -> Vec<PostReference> {
        trail.advance(CrawlState::Navigate);
        self.suppressor.install(page).await;

        if !self.navigate_profile(page, profile_url).await {
            if is_last {
                self.debug.capture(page, "no-post-links").await;
            }
            return Vec::new();
        }

        trail.advance(CrawlState::SuppressOverlays);
        self.suppressor.suppress(page).await;
        pause(self.politeness.after_profile).await;

        trail.advance(CrawlState::HarvestLinks);
        let posts = self.links.harvest(page, self.max_posts).await;
        if posts.is_empty() && is_last {
            self.debug.capture(page, "no-post-links").await;
        }
        posts
    }

    /// Loads a profile page, retrying once with a region hint after a timeout
    ///
    /// Other navigation failures are not retried.
    ///
    /// # Returns
    ///
    /// `true` if one of the two navigations succeeded
    async fn navigate_profile(&self, page: &B::Page, profile_url: &str) -> bool {
        let first = match page.goto(profile_url, self.navigation_timeout).await {
            Ok(()) => {
                self.wait_idle(page).await;
                return true;
            }
            Err(e) => e,
        };

        if !first.is_timeout() {
            tracing::warn!("Profile navigation failed: {}", first);
            return false;
        }

        let hinted = match with_region_hint(profile_url, &self.region) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot add region hint to {}: {}", profile_url, e);
                return false;
            }
        };
        tracing::warn!("Profile navigation failed ({}), retrying with {}", first, hinted);

        match page.goto(hinted.as_str(), self.navigation_timeout).await {
            Ok(()) => {
                self.wait_idle(page).await;
                true
            }
            Err(e) => {
                tracing::warn!("Profile navigation failed again: {}", e);
                false
            }
        }
    }

    // ===== Single-Post Mode =====

    /// Harvests and scores the comments of one post
    ///
    /// # Arguments
    ///
    /// * `post_url` - The post page; it is normalized before use
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Scored rows, possibly empty
    /// * `Err(SentryError)` - The URL is invalid or a context could not be created
    pub async fn crawl_single(&self, post_url: &str) -> Result<CrawlReport> {
        let url = normalize_post_url(post_url, &self.region)?;
        tracing::info!("Crawling post {}", url);

        let (summary, rows) = self.visit_post(url.as_str()).await?;
        let mut report = CrawlReport::new(post_url);
        report.trail = summary.trail.clone();
        report.push(summary, rows);
        Ok(report)
    }

    /// Runs the single-post path with device fallback, then scores
    async fn visit_post(&self, post_url: &str) -> Result<(PostReport, Vec<ScoredComment>)> {
        let mut trail = StateTrail::new();
        let mut extraction = Extraction::default();
        let mut profile_used = None;

        for (attempt, profile) in DeviceProfile::FALLBACK_CHAIN.into_iter().enumerate() {
            let is_last = attempt + 1 == DeviceProfile::FALLBACK_CHAIN.len();
            if attempt > 0 {
                tracing::warn!("No comments under the default profile, retrying as {}", profile);
                trail.advance(CrawlState::ErrorFallback);
                trail.advance(CrawlState::Start);
            }

            let trail_ref = &mut trail;
            extraction = self
                .devices
                .with_context(profile, |page| async move {
                    self.post_attempt(page.as_ref(), post_url, is_last, trail_ref)
                        .await
                })
                .await?;

            if !extraction.comments.is_empty() {
                profile_used = Some(profile);
                break;
            }
        }

        if extraction.comments.is_empty() {
            tracing::warn!("No comments found on {}", post_url);
            trail.advance(CrawlState::Failed);
            let summary = PostReport::new(post_url, extraction.title, None, trail);
            return Ok((summary, Vec::new()));
        }

        trail.advance(CrawlState::Score);
        let scraped_at = Utc::now().to_rfc3339();
        let rows = self
            .scoring
            .score(
                post_url,
                extraction.title.as_deref(),
                &scraped_at,
                &extraction.comments,
            )
            .await;
        trail.advance(CrawlState::Done);

        let mut summary = PostReport::new(post_url, extraction.title, profile_used, trail);
        summary.comments = rows.len();
        summary.flagged = rows.iter().filter(|r| r.flagged).count();
        tracing::info!(
            "Post {}: {} comments, {} flagged",
            post_url,
            summary.comments,
            summary.flagged
        );
        Ok((summary, rows))
    }

    async fn post_attempt(
        &self,
        page: &B::Page,
        post_url: &str,
        is_last: bool,
        trail: &mut StateTrail,
    ) -> Extraction {
        trail.advance(CrawlState::Navigate);
        self.suppressor.install(page).await;

        if let Err(e) = page.goto(post_url, self.navigation_timeout).await {
            tracing::warn!("Post navigation failed: {}", e);
            if is_last {
                self.debug.capture(page, "no-comments").await;
            }
            return Extraction::default();
        }
        self.wait_idle(page).await;

        trail.advance(CrawlState::SuppressOverlays);
        self.suppressor.suppress(page).await;

        trail.advance(CrawlState::LoadComments);
        self.loader.prepare(page).await;
        self.loader.load(page).await;
        self.loader.expand_replies(page).await;

        trail.advance(CrawlState::Extract);
        let extraction = self.extractor.extract(page).await;
        if extraction.comments.is_empty() && is_last {
            self.debug.capture(page, "no-comments").await;
        }
        extraction
    }

    async fn wait_idle(&self, page: &B::Page) {
        if let Err(e) = page.wait_for_network_idle(self.idle_timeout).await {
            tracing::debug!("Network did not settle, continuing: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedBrowser, ScriptedPage};
    use crate::harvest::ITEM_SELECTORS;
    use crate::scoring::LexiconScorer;
    use crate::state::CrawlState;

    const PROFILE: &str = "https://example.com/@alice";

    fn orchestrator(
        browser: &Arc<ScriptedBrowser>,
        debug_dir: &std::path::Path,
    ) -> CrawlOrchestrator<ScriptedBrowser> {
        let mut config = Config::default();
        config.output.debug_dir = debug_dir.display().to_string();
        let scoring = ScoringPipeline::new(Arc::new(LexiconScorer::default()), &config.scoring);
        CrawlOrchestrator::new(Arc::clone(browser), &config, scoring)
            .unwrap()
            .with_politeness(Politeness::none())
    }

    fn post_page(comments: &[&str]) -> ScriptedPage {
        ScriptedPage::new()
            .title("A post")
            .elements(ITEM_SELECTORS[0], comments)
    }

    #[tokio::test]
    async fn test_single_post_scored_under_mobile() {
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(ScriptedBrowser::new());
        browser.add_page_all(
            "https://example.com/post/1",
            post_page(&["alice\nlovely", "bob\nyou idiot, you moron, trash"]),
        );

        let report = orchestrator(&browser, dir.path())
            .crawl_single("https://example.com/post/1")
            .await
            .unwrap();

        assert_eq!(report.total_comments(), 2);
        assert_eq!(report.flagged_count(), 1);
        assert_eq!(report.posts[0].profile, Some(DeviceProfile::Mobile));
        assert_eq!(report.posts[0].title.as_deref(), Some("A post"));
        assert!(report.rows[0].post_url.ends_with("region=US#comments"));
        assert_eq!(report.trail.current(), CrawlState::Done);
        assert!(report.trail.is_consistent());
        assert_eq!(browser.opened_contexts(), vec![DeviceProfile::Mobile]);
        assert_eq!(browser.closed_contexts(), 1);
    }

    #[tokio::test]
    async fn test_profile_falls_back_to_desktop() {
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(ScriptedBrowser::new());
        browser.add_page(
            DeviceProfile::Mobile,
            PROFILE,
            ScriptedPage::new().frame("<p>open the app</p>"),
        );
        browser.add_page(
            DeviceProfile::Desktop,
            PROFILE,
            ScriptedPage::new().frame(r#"<a href="/post/1">1</a><a href="/post/2">2</a>"#),
        );
        browser.add_page_all("https://example.com/post/1", post_page(&["a\none"]));
        browser.add_page_all("https://example.com/post/2", post_page(&["b\ntwo"]));

        let report = orchestrator(&browser, dir.path())
            .crawl_profile(PROFILE)
            .await
            .unwrap();

        assert_eq!(report.posts.len(), 2);
        assert_eq!(report.total_comments(), 2);
        assert!(report.trail.visited(CrawlState::ErrorFallback));
        assert!(report.trail.is_consistent());
        assert_eq!(report.trail.current(), CrawlState::Done);
        assert_eq!(
            browser.opened_contexts(),
            vec![
                DeviceProfile::Mobile,
                DeviceProfile::Desktop,
                DeviceProfile::Mobile,
                DeviceProfile::Mobile,
            ]
        );
        assert_eq!(browser.closed_contexts(), 4);

        // Only the last attempt snapshots, and the desktop one succeeded
        assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
    }

    #[tokio::test]
    async fn test_unreachable_profile_fails_with_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(ScriptedBrowser::new());

        let report = orchestrator(&browser, dir.path())
            .crawl_profile(PROFILE)
            .await
            .unwrap();

        assert!(report.is_empty());
        assert!(report.posts.is_empty());
        assert_eq!(report.trail.current(), CrawlState::Failed);
        assert!(report.trail.is_consistent());
        assert_eq!(browser.closed_contexts(), 2);

        // A failed load that is not a timeout gets no region-hint retry
        assert_eq!(browser.navigations(), vec![PROFILE, PROFILE]);
    }

    #[test]
    fn test_jitter_within_bounds() {
        let range = (Duration::from_millis(600), Duration::from_millis(1200));
        for _ in 0..50 {
            let delay = jitter(range);
            assert!(delay >= range.0 && delay <= range.1);
        }
    }

    #[test]
    fn test_jitter_degenerate_range() {
        assert_eq!(jitter((Duration::ZERO, Duration::ZERO)), Duration::ZERO);
        let fixed = Duration::from_millis(5);
        assert_eq!(jitter((fixed, fixed)), fixed);
    }

    #[test]
    fn test_politeness_from_config() {
        let config = CrawlerConfig::default();
        let politeness = Politeness::from_config(&config);
        assert_eq!(politeness.between_posts.0, Duration::from_millis(600));
        assert_eq!(politeness.after_profile.1, Duration::from_millis(1000));

        let disabled = CrawlerConfig {
            politeness_min_ms: 0,
            politeness_max_ms: 0,
            ..Default::default()
        };
        assert_eq!(Politeness::from_config(&disabled), Politeness::none());
    }
}
