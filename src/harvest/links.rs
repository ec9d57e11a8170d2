//! Post link discovery on infinite-scroll profile pages
//!
//! Candidates come from three places in the serialized page: anchor
//! `href`s, `data-href` attributes, and URLs embedded in inline scripts
//! that mention posts. Only post-shaped links are kept.

use crate::browser::PageDriver;
use crate::config::CrawlerConfig;
use crate::harvest::overlay::OverlaySuppressor;
use crate::harvest::step::StepOutcome;
use crate::state::HarvestState;
use crate::url::{find_post_links, is_post_link, script_mentions_posts, PostReference};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Inline scripts scanned per iteration
const MAX_SCRIPTS: usize = 40;

const SETTLE_WAIT: Duration = Duration::from_millis(600);
const SCROLL_WAIT: Duration = Duration::from_millis(500);
const NUDGE_WAIT: Duration = Duration::from_millis(300);

const FORWARD_SCROLL: f64 = 0.9;
const NUDGE_SCROLL: f64 = -0.4;

/// Scrolls a profile page and collects post links
#[derive(Debug, Clone)]
pub struct LinkHarvester {
    suppressor: OverlaySuppressor,
    iterations: u32,
    stall_limit: u32,
    region: String,
}

impl LinkHarvester {
    pub fn new(suppressor: OverlaySuppressor, config: &CrawlerConfig) -> Self {
        Self {
            suppressor,
            iterations: config.link_iterations,
            stall_limit: config.link_stall_limit,
            region: config.region_hint.clone(),
        }
    }

    /// Harvests post links from a loaded profile page
    ///
    /// Scrolls until `max_posts` distinct links are seen, the iteration
    /// budget runs out, or the feed stops growing for `stall_limit`
    /// consecutive iterations (each stall gets one upward nudge first).
    ///
    /// # Arguments
    ///
    /// * `page` - A page showing the profile
    /// * `max_posts` - Maximum number of posts to return
    ///
    /// # Returns
    ///
    /// Normalized posts in discovery order, deduplicated by path, at most
    /// `max_posts` long
    pub async fn harvest<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        max_posts: usize,
    ) -> Vec<PostReference> {
        if max_posts == 0 {
            return Vec::new();
        }
        let mut state: HarvestState<String> = HarvestState::new();

        page.wait_for_timeout(SETTLE_WAIT).await;
        self.suppressor.clear(page).await;

        for iteration in 0..self.iterations {
            match self.candidates(page).await {
                StepOutcome::Success(links) => {
                    let added = state.merge(links);
                    tracing::debug!(
                        "Iteration {}: {} new links ({} total)",
                        iteration + 1,
                        added,
                        state.len()
                    );
                }
                StepOutcome::Skip { reason } => {
                    tracing::debug!("Iteration {}: no candidates ({})", iteration + 1, reason);
                }
                StepOutcome::Fail(e) => {
                    tracing::warn!("Link harvesting stopped: {}", e);
                    break;
                }
            }

            if state.len() >= max_posts {
                break;
            }

            if let Err(e) = page.scroll_page(FORWARD_SCROLL).await {
                tracing::debug!("Scroll failed: {}", e);
            }
            page.wait_for_timeout(SCROLL_WAIT).await;
            self.suppressor.clear(page).await;

            if !state.check_progress() {
                if let Err(e) = page.scroll_page(NUDGE_SCROLL).await {
                    tracing::debug!("Nudge scroll failed: {}", e);
                }
                page.wait_for_timeout(NUDGE_WAIT).await;
                self.suppressor.clear(page).await;

                if state.no_progress() >= self.stall_limit {
                    tracing::debug!("Feed stopped growing after {} iterations", iteration + 1);
                    break;
                }
            }
        }

        let posts = self.finalize(state.into_items(), max_posts);
        tracing::info!("Harvested {} post links", posts.len());
        posts
    }

    /// Normalizes, deduplicates by path and truncates
    fn finalize(&self, raw: Vec<String>, max_posts: usize) -> Vec<PostReference> {
        let mut seen_paths = HashSet::new();
        let mut posts = Vec::new();

        for link in raw {
            if posts.len() >= max_posts {
                break;
            }
            let post = match PostReference::from_raw(&link, &self.region) {
                Ok(post) => post,
                Err(e) => {
                    tracing::debug!("Dropping link {}: {}", link, e);
                    continue;
                }
            };
            let key = post.path_key.clone().unwrap_or_else(|| post.url.clone());
            if seen_paths.insert(key) {
                posts.push(post);
            }
        }

        posts
    }

    async fn candidates<P: PageDriver + ?Sized>(&self, page: &P) -> StepOutcome<Vec<String>> {
        let html = match StepOutcome::from_result(page.content().await) {
            StepOutcome::Success(html) => html,
            StepOutcome::Skip { reason } => return StepOutcome::Skip { reason },
            StepOutcome::Fail(e) => return StepOutcome::Fail(e),
        };
        let base = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok());

        StepOutcome::Success(extract_candidates(&html, base.as_ref()))
    }
}

/// Extracts post-shaped links from serialized page markup
///
/// Attribute links are resolved against `base` when relative. Results keep
/// document order: anchors, then `data-href` attributes, then inline
/// scripts.
pub fn extract_candidates(html: &str, base: Option<&Url>) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for (selector, attr) in [("a[href]", "href"), ("[data-href]", "data-href")] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(attr) {
                if let Some(absolute) = resolve(value, base) {
                    if is_post_link(&absolute) {
                        links.push(absolute);
                    }
                }
            }
        }
    }

    if let Ok(scripts) = Selector::parse("script:not([src])") {
        for script in document.select(&scripts).take(MAX_SCRIPTS) {
            let text: String = script.text().collect();
            if script_mentions_posts(&text) {
                links.extend(find_post_links(&text));
            }
        }
    }

    links
}

fn resolve(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok().map(String::from),
        None => Url::parse(href).ok().map(String::from),
    }
}
