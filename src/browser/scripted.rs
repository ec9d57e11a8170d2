//! In-memory scripted browser
//!
//! Replays fixed page states instead of driving a real browser, so the
//! harvesting and orchestration logic can be exercised deterministically.
//! Each registered page is a sequence of frames; every scroll, in either
//! direction, advances to the next frame, which is how lazily loaded
//! content is modelled. Waits return immediately.

use crate::browser::device::{DeviceContext, DeviceProfile};
use crate::browser::driver::{BrowserDriver, DriverError, DriverResult, PageDriver, RequestFilter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

/// Text of one scripted element
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedText {
    Text(String),
    /// Reading this element times out
    Timeout,
}

/// One snapshot of a page's DOM
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub html: String,
    pub elements: HashMap<String, Vec<ScriptedText>>,
}

/// Scripted behaviour of one URL
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    frames: Vec<Frame>,
    title: Option<String>,
    goto_failures: usize,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document title
    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Appends a frame with the given markup
    pub fn frame(mut self, html: &str) -> Self {
        self.frames.push(Frame {
            html: html.to_string(),
            elements: HashMap::new(),
        });
        self
    }

    /// Adds elements with the given texts to the last frame
    pub fn elements(mut self, selector: &str, texts: &[&str]) -> Self {
        self.last_frame()
            .elements
            .entry(selector.to_string())
            .or_default()
            .extend(texts.iter().map(|t| ScriptedText::Text(t.to_string())));
        self
    }

    /// Adds an element whose text read times out to the last frame
    pub fn slow_element(mut self, selector: &str) -> Self {
        self.last_frame()
            .elements
            .entry(selector.to_string())
            .or_default()
            .push(ScriptedText::Timeout);
        self
    }

    /// The first `n` navigations to this page time out
    pub fn fail_goto(mut self, n: usize) -> Self {
        self.goto_failures = n;
        self
    }

    fn last_frame(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::default());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

type PageTable = HashMap<(DeviceProfile, String), Arc<Mutex<ScriptedPage>>>;

/// Everything a scripted page recorded while it was used
#[derive(Debug, Default)]
struct Journal {
    navigations: Vec<String>,
    evaluations: usize,
    styles: usize,
    init_scripts: usize,
    routes: Vec<RequestFilter>,
    forward_scrolls: usize,
    element_scrolls: Vec<String>,
}

/// Scripted [`BrowserDriver`]
#[derive(Default)]
pub struct ScriptedBrowser {
    pages: Arc<Mutex<PageTable>>,
    opened: Mutex<Vec<DeviceProfile>>,
    closed: Arc<AtomicUsize>,
    journal: Arc<Mutex<Journal>>,
    fail_installs: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Pages are looked up by host and path only
fn page_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => format!("{}{}", parsed.host_str().unwrap_or(""), parsed.path()),
        Err(_) => url.to_string(),
    }
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a page for one device profile
    pub fn add_page(&self, profile: DeviceProfile, url: &str, page: ScriptedPage) {
        lock(&self.pages).insert((profile, page_key(url)), Arc::new(Mutex::new(page)));
    }

    /// Registers the same page for both device profiles
    pub fn add_page_all(&self, url: &str, page: ScriptedPage) {
        for profile in DeviceProfile::FALLBACK_CHAIN {
            self.add_page(profile, url, page.clone());
        }
    }

    /// Makes stylesheet, init-script and route installation fail
    pub fn fail_installs(&self, fail: bool) {
        self.fail_installs.store(fail, Ordering::SeqCst);
    }

    /// Profiles of every context opened so far, in order
    pub fn opened_contexts(&self) -> Vec<DeviceProfile> {
        lock(&self.opened).clone()
    }

    /// Number of contexts closed so far
    pub fn closed_contexts(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every URL passed to `goto`, in order
    pub fn navigations(&self) -> Vec<String> {
        lock(&self.journal).navigations.clone()
    }

    /// Number of scripts evaluated across all pages
    pub fn evaluations(&self) -> usize {
        lock(&self.journal).evaluations
    }

    /// Number of stylesheets and init scripts injected
    pub fn injections(&self) -> (usize, usize) {
        let journal = lock(&self.journal);
        (journal.styles, journal.init_scripts)
    }

    /// Request filters installed across all contexts
    pub fn routes(&self) -> Vec<RequestFilter> {
        lock(&self.journal).routes.clone()
    }

    /// Number of forward scrolls across all pages
    pub fn forward_scrolls(&self) -> usize {
        lock(&self.journal).forward_scrolls
    }

    /// Selectors of every scrolled element, in order
    pub fn element_scrolls(&self) -> Vec<String> {
        lock(&self.journal).element_scrolls.clone()
    }
}

#[async_trait]
impl BrowserDriver for ScriptedBrowser {
    type Page = ScriptedPageHandle;

    async fn open_context(&self, device: &DeviceContext) -> DriverResult<Self::Page> {
        lock(&self.opened).push(device.profile);
        Ok(ScriptedPageHandle {
            profile: device.profile,
            pages: Arc::clone(&self.pages),
            journal: Arc::clone(&self.journal),
            closed_counter: Arc::clone(&self.closed),
            fail_installs: self.fail_installs.load(Ordering::SeqCst),
            current: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }
}

#[derive(Debug)]
struct Loaded {
    url: String,
    page: ScriptedPage,
    frame: usize,
}

/// Page handle of the scripted browser
pub struct ScriptedPageHandle {
    profile: DeviceProfile,
    pages: Arc<Mutex<PageTable>>,
    journal: Arc<Mutex<Journal>>,
    closed_counter: Arc<AtomicUsize>,
    fail_installs: bool,
    current: Mutex<Option<Loaded>>,
    closed: AtomicBool,
}

impl ScriptedPageHandle {
    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn with_frame<T>(&self, f: impl FnOnce(Option<&Frame>) -> T) -> DriverResult<T> {
        self.ensure_open()?;
        let current = lock(&self.current);
        let frame = current.as_ref().and_then(|l| l.page.frames.get(l.frame));
        Ok(f(frame))
    }

    fn install(&self) -> DriverResult<()> {
        self.ensure_open()?;
        if self.fail_installs {
            return Err(DriverError::Script("injection refused".to_string()));
        }
        Ok(())
    }

    fn advance(&self, fraction: f64) {
        let mut current = lock(&self.current);
        if let Some(loaded) = current.as_mut() {
            if loaded.frame + 1 < loaded.page.frames.len() {
                loaded.frame += 1;
            }
        }
        if fraction > 0.0 {
            lock(&self.journal).forward_scrolls += 1;
        }
    }
}

#[async_trait]
impl PageDriver for ScriptedPageHandle {
    async fn goto(&self, url: &str, timeout: Duration) -> DriverResult<()> {
        self.ensure_open()?;
        lock(&self.journal).navigations.push(url.to_string());

        let entry = lock(&self.pages)
            .get(&(self.profile, page_key(url)))
            .cloned()
            .ok_or_else(|| DriverError::Navigation {
                url: url.to_string(),
                message: "no scripted page".to_string(),
            })?;

        let page = {
            let mut scripted = lock(&entry);
            if scripted.goto_failures > 0 {
                scripted.goto_failures -= 1;
                return Err(DriverError::timeout("navigation", timeout));
            }
            scripted.clone()
        };

        *lock(&self.current) = Some(Loaded {
            url: url.to_string(),
            page,
            frame: 0,
        });
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> DriverResult<()> {
        self.ensure_open()
    }

    async fn url(&self) -> DriverResult<Option<String>> {
        self.ensure_open()?;
        Ok(lock(&self.current).as_ref().map(|l| l.url.clone()))
    }

    async fn evaluate(&self, _script: &str) -> DriverResult<serde_json::Value> {
        self.ensure_open()?;
        lock(&self.journal).evaluations += 1;
        Ok(serde_json::Value::Null)
    }

    async fn add_style_tag(&self, _css: &str) -> DriverResult<()> {
        self.install()?;
        lock(&self.journal).styles += 1;
        Ok(())
    }

    async fn add_init_script(&self, _script: &str) -> DriverResult<()> {
        self.install()?;
        lock(&self.journal).init_scripts += 1;
        Ok(())
    }

    async fn route(&self, filter: RequestFilter) -> DriverResult<()> {
        self.install()?;
        lock(&self.journal).routes.push(filter);
        Ok(())
    }

    async fn count(&self, selector: &str) -> DriverResult<usize> {
        self.with_frame(|frame| {
            frame
                .and_then(|f| f.elements.get(selector))
                .map_or(0, |items| items.len())
        })
    }

    async fn inner_text(
        &self,
        selector: &str,
        index: usize,
        timeout: Duration,
    ) -> DriverResult<String> {
        let text = self.with_frame(|frame| {
            frame
                .and_then(|f| f.elements.get(selector))
                .and_then(|items| items.get(index))
                .cloned()
        })?;

        match text {
            Some(ScriptedText::Text(text)) => Ok(text),
            Some(ScriptedText::Timeout) => Err(DriverError::timeout("inner_text", timeout)),
            None => Err(DriverError::NotFound(format!("{}[{}]", selector, index))),
        }
    }

    async fn is_visible(&self, selector: &str) -> DriverResult<bool> {
        Ok(self.count(selector).await? > 0)
    }

    async fn scroll_page(&self, fraction: f64) -> DriverResult<()> {
        self.ensure_open()?;
        self.advance(fraction);
        Ok(())
    }

    async fn scroll_element(&self, selector: &str, fraction: f64) -> DriverResult<()> {
        if self.count(selector).await? == 0 {
            return Err(DriverError::NotFound(selector.to_string()));
        }
        lock(&self.journal).element_scrolls.push(selector.to_string());
        self.advance(fraction);
        Ok(())
    }

    async fn press_escape(&self) -> DriverResult<()> {
        self.ensure_open()
    }

    async fn wait_for_timeout(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }

    async fn title(&self) -> DriverResult<Option<String>> {
        self.ensure_open()?;
        Ok(lock(&self.current)
            .as_ref()
            .and_then(|l| l.page.title.clone()))
    }

    async fn content(&self) -> DriverResult<String> {
        self.with_frame(|frame| frame.map(|f| f.html.clone()).unwrap_or_default())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        self.ensure_open()?;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn close(&self) -> DriverResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closed_counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_frames_advance_on_scroll() {
        let browser = ScriptedBrowser::new();
        browser.add_page(
            DeviceProfile::Mobile,
            "https://example.com/@me",
            ScriptedPage::new().frame("<p>one</p>").frame("<p>two</p>"),
        );
        let page = browser
            .open_context(&DeviceProfile::Mobile.context())
            .await
            .unwrap();

        page.goto("https://example.com/@me?region=US", WAIT)
            .await
            .unwrap();
        assert_eq!(page.content().await.unwrap(), "<p>one</p>");
        page.scroll_page(-0.4).await.unwrap();
        assert_eq!(page.content().await.unwrap(), "<p>two</p>");
        page.scroll_page(0.9).await.unwrap();
        assert_eq!(page.content().await.unwrap(), "<p>two</p>");
        assert_eq!(browser.forward_scrolls(), 1);
    }

    #[tokio::test]
    async fn test_goto_failures_then_success() {
        let browser = ScriptedBrowser::new();
        browser.add_page(
            DeviceProfile::Mobile,
            "https://example.com/@me",
            ScriptedPage::new().fail_goto(1),
        );
        let page = browser
            .open_context(&DeviceProfile::Mobile.context())
            .await
            .unwrap();

        let first = page.goto("https://example.com/@me", WAIT).await;
        assert!(first.unwrap_err().is_timeout());
        assert!(page.goto("https://example.com/@me", WAIT).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_page_rejects_operations() {
        let browser = ScriptedBrowser::new();
        let page = browser
            .open_context(&DeviceProfile::Desktop.context())
            .await
            .unwrap();
        page.close().await.unwrap();
        page.close().await.unwrap();

        assert!(matches!(page.count("a").await, Err(DriverError::Closed)));
        assert_eq!(browser.closed_contexts(), 1);
    }

    #[tokio::test]
    async fn test_element_texts() {
        let browser = ScriptedBrowser::new();
        browser.add_page_all(
            "https://example.com/post/1",
            ScriptedPage::new()
                .elements(".item", &["a", "b"])
                .slow_element(".item"),
        );
        let page = browser
            .open_context(&DeviceProfile::Mobile.context())
            .await
            .unwrap();
        page.goto("https://example.com/post/1", WAIT).await.unwrap();

        assert_eq!(page.count(".item").await.unwrap(), 3);
        assert_eq!(page.inner_text(".item", 1, WAIT).await.unwrap(), "b");
        assert!(page.inner_text(".item", 2, WAIT).await.unwrap_err().is_timeout());
        assert!(matches!(
            page.inner_text(".item", 9, WAIT).await,
            Err(DriverError::NotFound(_))
        ));
    }
}
