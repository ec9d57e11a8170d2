//! Browser driver traits and error types
//!
//! The harvesting layers talk to the browser only through [`PageDriver`]
//! and [`BrowserDriver`]. The production backend is chromiumoxide; tests
//! use the scripted in-memory driver.

use crate::browser::device::DeviceContext;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by browser operations
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("No element matches selector {0}")]
    NotFound(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    #[error("Page or context already closed")]
    Closed,
}

impl DriverError {
    /// Creates a timeout error for the named operation
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Returns true for timeouts
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the failure only affects the current item or step
    ///
    /// Timeouts, missing elements and script errors are transient: the
    /// caller skips and carries on. Launch, protocol and closed-page errors
    /// mean the page is no longer usable for this attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::NotFound(_) | Self::Script(_) | Self::Navigation { .. }
        )
    }
}

/// Result type for browser operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Verdict of the request filter for one outgoing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Continue,
    Abort,
}

/// Network request filter installed on every browsing context
///
/// Holds only compiled patterns, so deciding is a pure function of the
/// URL and the filter can be shared across interception tasks freely.
#[derive(Debug, Clone)]
pub struct RequestFilter {
    patterns: Arc<Vec<Regex>>,
}

impl RequestFilter {
    /// Compiles the block patterns
    ///
    /// # Returns
    ///
    /// * `Ok(RequestFilter)` - All patterns compiled
    /// * `Err(regex::Error)` - A pattern is not a valid regex
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns: Arc::new(compiled),
        })
    }

    /// Decides whether a request may proceed
    ///
    /// The URL is lowercased before matching.
    pub fn decide(&self, url: &str) -> RouteDecision {
        let lowered = url.to_lowercase();
        if self.patterns.iter().any(|re| re.is_match(&lowered)) {
            RouteDecision::Abort
        } else {
            RouteDecision::Continue
        }
    }

    /// Number of patterns in the filter
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if the filter blocks nothing
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// One page inside an isolated browsing context
///
/// Every method carries its own timeout; none blocks indefinitely.
/// Selectors are CSS selectors. Indexed element operations address the
/// n-th match of `document.querySelectorAll(selector)`.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates and waits for the DOM to be ready
    async fn goto(&self, url: &str, timeout: Duration) -> DriverResult<()>;

    /// Waits until no new network resources load for a short quiet period
    async fn wait_for_network_idle(&self, timeout: Duration) -> DriverResult<()>;

    /// Current page URL
    async fn url(&self) -> DriverResult<Option<String>>;

    /// Evaluates a JavaScript expression and returns its JSON value
    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value>;

    /// Injects a stylesheet into the current document
    async fn add_style_tag(&self, css: &str) -> DriverResult<()>;

    /// Registers a script that runs in every new document before page scripts
    async fn add_init_script(&self, script: &str) -> DriverResult<()>;

    /// Routes every outgoing request through the filter
    async fn route(&self, filter: RequestFilter) -> DriverResult<()>;

    /// Number of elements matching the selector
    async fn count(&self, selector: &str) -> DriverResult<usize>;

    /// Visible text of the n-th match
    async fn inner_text(&self, selector: &str, index: usize, timeout: Duration)
        -> DriverResult<String>;

    /// Returns true if the first match is rendered and has a non-empty box
    async fn is_visible(&self, selector: &str) -> DriverResult<bool>;

    /// Scrolls the window by a fraction of the viewport height (negative scrolls up)
    async fn scroll_page(&self, fraction: f64) -> DriverResult<()>;

    /// Scrolls the first match by a fraction of its own height
    async fn scroll_element(&self, selector: &str, fraction: f64) -> DriverResult<()>;

    /// Sends an Escape key press to the document
    async fn press_escape(&self) -> DriverResult<()>;

    /// Suspends for the given time
    async fn wait_for_timeout(&self, duration: Duration);

    /// Document title
    async fn title(&self) -> DriverResult<Option<String>>;

    /// Serialized page markup
    async fn content(&self) -> DriverResult<String>;

    /// Full-page PNG screenshot
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    /// Closes the page and releases its browsing context
    async fn close(&self) -> DriverResult<()>;
}

/// A browser able to create isolated browsing contexts
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Page: PageDriver + 'static;

    /// Creates a fresh context emulating the given device and opens one page in it
    async fn open_context(&self, device: &DeviceContext) -> DriverResult<Self::Page>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_filter() -> RequestFilter {
        RequestFilter::new(&crate::config::OverlayConfig::default().block_patterns).unwrap()
    }

    #[test]
    fn test_filter_blocks_app_walls() {
        let filter = default_filter();
        assert_eq!(
            filter.decide("https://www.example.com/seo-landing/abc"),
            RouteDecision::Abort
        );
        assert_eq!(
            filter.decide("https://example.com/jump/download?x=1"),
            RouteDecision::Abort
        );
        assert_eq!(
            filter.decide("https://cdn.AppsFlyer.com/sdk.js"),
            RouteDecision::Abort
        );
        assert_eq!(
            filter.decide("https://example.app.link/branch.io/x"),
            RouteDecision::Abort
        );
    }

    #[test]
    fn test_filter_allows_content() {
        let filter = default_filter();
        assert_eq!(
            filter.decide("https://www.example.com/post/123"),
            RouteDecision::Continue
        );
        assert_eq!(
            filter.decide("https://static.example.com/app.css"),
            RouteDecision::Continue
        );
    }

    #[test]
    fn test_filter_is_stateless() {
        let filter = default_filter();
        let url = "https://example.com/openapp?id=1";
        let first = filter.decide(url);
        let _ = filter.decide("https://example.com/post/1");
        assert_eq!(filter.decide(url), first);
        assert_eq!(filter.clone().decide(url), first);
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        let filter = RequestFilter::new::<&str>(&[]).unwrap();
        assert!(filter.is_empty());
        assert_eq!(filter.decide("https://x.com/install"), RouteDecision::Continue);
    }

    #[test]
    fn test_error_classification() {
        assert!(DriverError::timeout("read", Duration::from_millis(10)).is_transient());
        assert!(DriverError::NotFound("a".into()).is_transient());
        assert!(!DriverError::Closed.is_transient());
        assert!(!DriverError::Protocol("gone".into()).is_transient());
    }
}
