//! Comment section loading
//!
//! Comment lists mount lazily as they are scrolled. The loader scrolls the
//! dedicated list container when one is visible (the page otherwise) until
//! enough items are present, using a two-strike test before giving up: an
//! unchanged count gets one backward nudge and a recount first.

use crate::browser::PageDriver;
use crate::config::CrawlerConfig;
use crate::harvest::overlay::OverlaySuppressor;
use crate::harvest::step::StepOutcome;
use std::time::Duration;

/// Scrollable comment list containers, most specific first
pub const CONTAINER_SELECTORS: &[&str] = &[
    "[class*='comment'] [class*='list']",
    "[class*='Comments'] [class*='list']",
    "[data-scroll='comments']",
    "section[role='feed']",
];

/// Comment item selectors, most specific first
pub const ITEM_SELECTORS: &[&str] = &[
    ".article-comment-item-wrapper .article-comment-item",
    ".comment-reply-list .article-comment-item",
    "[class*='comment'] [class*='item']",
    "[data-e2e*='comment']",
];

const SCROLL_WAIT: Duration = Duration::from_millis(350);
const NUDGE_WAIT: Duration = Duration::from_millis(250);
const WARMUP_WAIT: Duration = Duration::from_millis(250);
const EXPAND_WAIT: Duration = Duration::from_millis(400);

const FORWARD_SCROLL: f64 = 0.9;
const NUDGE_SCROLL: f64 = -0.4;
const WARMUP_SCROLLS: usize = 3;
const EXPAND_ROUNDS: usize = 5;

const OPEN_COMMENTS_TAB: &str = r#"(() => {
    const direct = document.querySelector("[data-tab='comments']");
    if (direct) { direct.click(); return true; }
    const candidates = Array.from(document.querySelectorAll("[role='tab'], button, a"));
    const tab = candidates.find(el => /^\s*comment/i.test(el.innerText || ''));
    if (tab) { tab.click(); return true; }
    return false;
})()"#;

const EXPAND_REPLIES: &str = r#"(() => {
    const pattern = /(view|show|see|load)\s+(more\s+)?(\d+\s+)?(replies|reply|comments)/i;
    let clicked = 0;
    for (const el of document.querySelectorAll("button, a, [role='button'], span, div")) {
        if (clicked >= 20) break;
        if (el.children.length > 2) continue;
        const text = (el.innerText || '').trim();
        if (text.length === 0 || text.length > 40 || !pattern.test(text)) continue;
        try { el.click(); clicked++; } catch (_) {}
    }
    return clicked;
})()"#;

/// Result of a loading run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Comment items present when loading stopped
    pub items: usize,

    /// Scroll cycles spent
    pub cycles: u32,
}

/// Scrolls a post's comment section until enough comments are mounted
#[derive(Debug, Clone)]
pub struct CommentLoader {
    suppressor: OverlaySuppressor,
    target: usize,
    max_cycles: u32,
}

impl CommentLoader {
    pub fn new(suppressor: OverlaySuppressor, config: &CrawlerConfig) -> Self {
        Self {
            suppressor,
            target: config.comment_target,
            max_cycles: config.comment_cycles,
        }
    }

    /// Opens the comments tab and warms the page up with a few scrolls
    pub async fn prepare<P: PageDriver + ?Sized>(&self, page: &P) {
        match page.evaluate(OPEN_COMMENTS_TAB).await {
            Ok(value) if value.as_bool() == Some(true) => {
                tracing::debug!("Opened comments tab");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Comments tab lookup failed: {}", e),
        }

        for _ in 0..WARMUP_SCROLLS {
            if let Err(e) = page.scroll_page(FORWARD_SCROLL).await {
                tracing::debug!("Warm-up scroll failed: {}", e);
                break;
            }
            page.wait_for_timeout(WARMUP_WAIT).await;
            self.suppressor.clear(page).await;
        }
    }

    /// Scrolls until `target` comment items are present or the cycle budget
    /// runs out
    ///
    /// # Arguments
    ///
    /// * `page` - A page showing one post
    ///
    /// # Returns
    ///
    /// The final item count and the number of cycles used
    pub async fn load<P: PageDriver + ?Sized>(&self, page: &P) -> LoadReport {
        let mut cycles = 0;
        let mut last = match count_items(page).await {
            StepOutcome::Success(n) => n,
            StepOutcome::Skip { .. } => 0,
            StepOutcome::Fail(e) => {
                tracing::warn!("Comment loading aborted: {}", e);
                return LoadReport { items: 0, cycles };
            }
        };

        while last < self.target && cycles < self.max_cycles {
            cycles += 1;
            let container = visible_container(page).await;

            self.scroll(page, container, FORWARD_SCROLL).await;
            page.wait_for_timeout(SCROLL_WAIT).await;
            self.suppressor.clear(page).await;

            let Some(count) = count_items(page).await.success() else {
                break;
            };
            if count != last {
                last = count;
                continue;
            }

            self.scroll(page, container, NUDGE_SCROLL).await;
            page.wait_for_timeout(NUDGE_WAIT).await;
            self.suppressor.clear(page).await;

            let Some(recount) = count_items(page).await.success() else {
                break;
            };
            if recount == last {
                tracing::debug!("Comment count settled at {} after {} cycles", last, cycles);
                break;
            }
            last = recount;
        }

        tracing::info!("Loaded {} comment items in {} cycles", last, cycles);
        LoadReport {
            items: last,
            cycles,
        }
    }

    /// Clicks reply expanders until none are left or the round budget is spent
    ///
    /// # Returns
    ///
    /// Total number of expanders clicked
    pub async fn expand_replies<P: PageDriver + ?Sized>(&self, page: &P) -> usize {
        let mut total = 0;
        for _ in 0..EXPAND_ROUNDS {
            let clicked = match page.evaluate(EXPAND_REPLIES).await {
                Ok(value) => value.as_u64().unwrap_or(0) as usize,
                Err(e) => {
                    tracing::debug!("Reply expansion failed: {}", e);
                    0
                }
            };
            if clicked == 0 {
                break;
            }
            total += clicked;
            page.wait_for_timeout(EXPAND_WAIT).await;
            self.suppressor.sweep(page).await;
        }
        if total > 0 {
            tracing::debug!("Expanded {} reply threads", total);
        }
        total
    }

    async fn scroll<P: PageDriver + ?Sized>(&self, page: &P, container: Option<&str>, fraction: f64) {
        let result = match container {
            Some(selector) => page.scroll_element(selector, fraction).await,
            None => page.scroll_page(fraction).await,
        };
        if let Err(e) = result {
            tracing::debug!("Comment scroll failed: {}", e);
        }
    }
}

/// First comment list container that is currently visible
async fn visible_container<P: PageDriver + ?Sized>(page: &P) -> Option<&'static str> {
    for selector in CONTAINER_SELECTORS {
        if let Ok(true) = page.is_visible(selector).await {
            return Some(selector);
        }
    }
    None
}

/// Comment items currently mounted
///
/// Item selectors overlap (a generic selector may match the same nodes as
/// a specific one), so the largest single count is used, not the sum.
pub async fn count_items<P: PageDriver + ?Sized>(page: &P) -> StepOutcome<usize> {
    let mut best = 0;
    for selector in ITEM_SELECTORS {
        match StepOutcome::from_result(page.count(selector).await) {
            StepOutcome::Success(n) => best = best.max(n),
            StepOutcome::Skip { reason } => {
                tracing::trace!("Count of {} skipped: {}", selector, reason);
            }
            StepOutcome::Fail(e) => return StepOutcome::Fail(e),
        }
    }
    StepOutcome::Success(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedBrowser, ScriptedPage, ScriptedPageHandle};
    use crate::browser::{BrowserDriver, DeviceProfile};
    use crate::config::OverlayConfig;

    const POST: &str = "https://example.com/post/1";
    const ITEM: &str = "[class*='comment'] [class*='item']";

    fn loader(target: usize) -> CommentLoader {
        let config = CrawlerConfig {
            comment_target: target,
            ..Default::default()
        };
        CommentLoader::new(OverlaySuppressor::new(&OverlayConfig::default()).unwrap(), &config)
    }

    fn items(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("user{}\nhello {}", i, i)).collect()
    }

    fn with_items(page: ScriptedPage, n: usize) -> ScriptedPage {
        let texts = items(n);
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        page.elements(ITEM, &refs)
    }

    async fn open(browser: &ScriptedBrowser, page: ScriptedPage) -> ScriptedPageHandle {
        browser.add_page(DeviceProfile::Mobile, POST, page);
        let handle = browser
            .open_context(&DeviceProfile::Mobile.context())
            .await
            .unwrap();
        handle.goto(POST, Duration::from_secs(1)).await.unwrap();
        handle
    }

    #[tokio::test]
    async fn test_loads_until_target() {
        let browser = ScriptedBrowser::new();
        let mut page = ScriptedPage::new();
        for n in [2, 4, 6, 8] {
            page = with_items(page.frame(""), n);
        }
        let handle = open(&browser, page).await;

        let report = loader(6).load(&handle).await;
        assert_eq!(report, LoadReport { items: 6, cycles: 2 });
    }

    #[tokio::test]
    async fn test_nudge_tolerates_one_lagging_frame() {
        let browser = ScriptedBrowser::new();
        let mut page = ScriptedPage::new();
        for n in [2, 2, 4] {
            page = with_items(page.frame(""), n);
        }
        let handle = open(&browser, page).await;

        let report = loader(4).load(&handle).await;
        assert_eq!(report.items, 4);
        assert_eq!(report.cycles, 1);
    }

    #[tokio::test]
    async fn test_stops_when_count_settles() {
        let browser = ScriptedBrowser::new();
        let handle = open(&browser, with_items(ScriptedPage::new().frame(""), 3)).await;

        let report = loader(60).load(&handle).await;
        assert_eq!(report, LoadReport { items: 3, cycles: 1 });
    }

    #[tokio::test]
    async fn test_cycle_budget_bounds_loading() {
        let browser = ScriptedBrowser::new();
        let mut page = ScriptedPage::new();
        for n in 1..=100 {
            page = with_items(page.frame(""), n);
        }
        let handle = open(&browser, page).await;

        let report = loader(1000).load(&handle).await;
        assert_eq!(report.cycles, CrawlerConfig::default().comment_cycles);
        assert!(report.items < 100);
    }

    #[tokio::test]
    async fn test_container_scrolled_when_visible() {
        let browser = ScriptedBrowser::new();
        let page = ScriptedPage::new()
            .frame("")
            .elements("section[role='feed']", &[""]);
        let page = with_items(page, 1)
            .frame("")
            .elements("section[role='feed']", &[""]);
        let handle = open(&browser, with_items(page, 2)).await;

        let report = loader(2).load(&handle).await;
        assert_eq!(report.items, 2);
        assert_eq!(browser.element_scrolls(), vec!["section[role='feed']"]);
    }

    #[tokio::test]
    async fn test_count_uses_largest_selector() {
        let browser = ScriptedBrowser::new();
        let page = with_items(ScriptedPage::new().frame(""), 3)
            .elements("[data-e2e*='comment']", &["a", "b"]);
        let handle = open(&browser, page).await;

        assert_eq!(count_items(&handle).await.success(), Some(3));
    }

    #[tokio::test]
    async fn test_expand_replies_stops_when_nothing_clicked() {
        let browser = ScriptedBrowser::new();
        let handle = open(&browser, ScriptedPage::new()).await;

        assert_eq!(loader(1).expand_replies(&handle).await, 0);
        assert_eq!(browser.evaluations(), 1);
    }
}
