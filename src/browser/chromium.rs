//! Chromium backend over the DevTools protocol
//!
//! Each device context is a separate CDP browser context, so cookies and
//! storage never leak between the mobile and desktop attempts. Element
//! operations run as small JavaScript snippets bounded by a timeout.

use crate::browser::device::DeviceContext;
use crate::browser::driver::{
    BrowserDriver, DriverError, DriverResult, PageDriver, RequestFilter, RouteDecision,
};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig as LaunchConfig;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Handler, Page};
use futures::StreamExt;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Upper bound for every script evaluation
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Quiet period the network-idle heuristic waits for
const IDLE_QUIET_MS: u64 = 1000;

fn protocol(e: CdpError) -> DriverError {
    DriverError::Protocol(e.to_string())
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs a CDP future under a deadline
async fn bounded<T, F>(operation: &str, after: Duration, fut: F) -> DriverResult<T>
where
    F: Future<Output = Result<T, CdpError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(protocol(e)),
        Err(_) => Err(DriverError::timeout(operation, after)),
    }
}

/// A trusted Escape key event, sent through the input domain
fn escape_key(kind: DispatchKeyEventType) -> DriverResult<DispatchKeyEventParams> {
    DispatchKeyEventParams::builder()
        .r#type(kind)
        .key("Escape")
        .code("Escape")
        .windows_virtual_key_code(27)
        .native_virtual_key_code(27)
        .build()
        .map_err(DriverError::Protocol)
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::warn!("Browser handler event error: {}", e);
            }
        }
        tracing::debug!("Browser handler finished");
    })
}

/// A launched or connected Chromium instance
pub struct ChromiumBrowser {
    browser: Arc<Browser>,
    _handler: AbortOnDrop,
}

impl ChromiumBrowser {
    /// Launches a local Chromium, or connects to a remote one when
    /// `chrome_url` is configured
    ///
    /// # Arguments
    ///
    /// * `config` - Browser section of the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(ChromiumBrowser)` - Browser ready for contexts
    /// * `Err(DriverError::Launch)` - Chromium could not be started or reached
    pub async fn start(config: &BrowserConfig) -> DriverResult<Self> {
        let (browser, handler) = match &config.chrome_url {
            Some(endpoint) => {
                tracing::info!("Connecting to remote browser at {}", endpoint);
                Browser::connect(endpoint.as_str())
                    .await
                    .map_err(|e| DriverError::Launch(e.to_string()))?
            }
            None => {
                let mut builder = LaunchConfig::builder();
                if config.headful {
                    builder = builder.with_head();
                }
                if let Some(bin) = &config.chrome_bin {
                    builder = builder.chrome_executable(bin);
                }
                let launch = builder.build().map_err(DriverError::Launch)?;
                tracing::info!(
                    "Launching {} browser",
                    if config.headful { "headful" } else { "headless" }
                );
                Browser::launch(launch)
                    .await
                    .map_err(|e| DriverError::Launch(e.to_string()))?
            }
        };

        Ok(Self {
            browser: Arc::new(browser),
            _handler: AbortOnDrop(spawn_handler(handler)),
        })
    }

    async fn emulate(page: &Page, device: &DeviceContext) -> Result<(), CdpError> {
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(device.width),
            i64::from(device.height),
            device.device_scale_factor,
            device.is_mobile,
        ))
        .await?;
        page.execute(SetTouchEmulationEnabledParams::new(device.has_touch))
            .await?;
        page.execute(SetUserAgentOverrideParams::new(device.user_agent.clone()))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for ChromiumBrowser {
    type Page = ChromiumPage;

    async fn open_context(&self, device: &DeviceContext) -> DriverResult<Self::Page> {
        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(protocol)?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(DriverError::Protocol)?;

        let page = match self.browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                dispose_context(&self.browser, context_id).await;
                return Err(protocol(e));
            }
        };

        let handle = ChromiumPage {
            page,
            browser: Arc::clone(&self.browser),
            context_id: Mutex::new(Some(context_id)),
            interceptor: Mutex::new(None),
            closed: AtomicBool::new(false),
        };

        if let Err(e) = Self::emulate(&handle.page, device).await {
            let _ = handle.close().await;
            return Err(protocol(e));
        }

        Ok(handle)
    }
}

async fn dispose_context(browser: &Browser, context_id: BrowserContextId) {
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        tracing::warn!("Failed to dispose browser context: {}", e);
    }
}

/// One page inside its own browser context
pub struct ChromiumPage {
    page: Page,
    browser: Arc<Browser>,
    context_id: Mutex<Option<BrowserContextId>>,
    interceptor: Mutex<Option<AbortOnDrop>>,
    closed: AtomicBool,
}

impl ChromiumPage {
    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn take_context(&self) -> Option<BrowserContextId> {
        self.context_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn set_interceptor(&self, task: Option<AbortOnDrop>) {
        *self
            .interceptor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = task;
    }

    /// Evaluates a script and returns its JSON value, `Null` for undefined
    async fn eval(&self, operation: &str, script: &str, after: Duration) -> DriverResult<Value> {
        self.ensure_open()?;
        match tokio::time::timeout(after, self.page.evaluate(script)).await {
            Ok(Ok(result)) => Ok(result.value().cloned().unwrap_or(Value::Null)),
            Ok(Err(e)) => Err(DriverError::Script(e.to_string())),
            Err(_) => Err(DriverError::timeout(operation, after)),
        }
    }

    /// Evaluates a script against the n-th match of a selector
    ///
    /// The snippet sees the element as `el` and must return a value; a
    /// missing element yields `NotFound`.
    async fn with_element(
        &self,
        operation: &str,
        selector: &str,
        index: usize,
        body: &str,
        after: Duration,
    ) -> DriverResult<Value> {
        let script = format!(
            "(() => {{ const el = document.querySelectorAll({sel})[{index}]; \
             if (!el) return {{ missing: true }}; return {{ value: ({body}) }}; }})()",
            sel = js_string(selector),
            index = index,
            body = body,
        );
        let result = self.eval(operation, &script, after).await?;
        if result.get("missing").and_then(Value::as_bool).unwrap_or(false) {
            return Err(DriverError::NotFound(selector.to_string()));
        }
        Ok(result.get("value").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> DriverResult<()> {
        self.ensure_open()?;
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(DriverError::timeout("navigation", timeout)),
        }
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> DriverResult<()> {
        let timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        let script = format!(
            r#"(async () => {{
                const timeoutMs = {timeout_ms};
                const idleMs = {idle_ms};
                const interval = 250;
                const start = Date.now();
                let last = performance.getEntriesByType('resource').length;
                let stable = 0;
                while (Date.now() - start < timeoutMs) {{
                    await new Promise(r => setTimeout(r, interval));
                    const cur = performance.getEntriesByType('resource').length;
                    if (document.readyState === 'complete' && cur === last) {{
                        stable += interval;
                        if (stable >= idleMs) return true;
                    }} else {{
                        stable = 0;
                    }}
                    last = cur;
                }}
                return false;
            }})()"#,
            timeout_ms = timeout_ms,
            idle_ms = IDLE_QUIET_MS,
        );

        // The script gives up on its own; the outer bound covers a hung evaluation.
        let settled = self
            .eval("network idle", &script, timeout + Duration::from_secs(2))
            .await?;
        if settled.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(DriverError::timeout("network idle", timeout))
        }
    }

    async fn url(&self) -> DriverResult<Option<String>> {
        self.ensure_open()?;
        bounded("url", SCRIPT_TIMEOUT, self.page.url()).await
    }

    async fn evaluate(&self, script: &str) -> DriverResult<Value> {
        self.eval("evaluate", script, SCRIPT_TIMEOUT).await
    }

    async fn add_style_tag(&self, css: &str) -> DriverResult<()> {
        let script = format!(
            "(() => {{ const s = document.createElement('style'); s.textContent = {css}; \
             (document.head || document.documentElement).appendChild(s); return true; }})()",
            css = js_string(css),
        );
        self.eval("add_style_tag", &script, SCRIPT_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn add_init_script(&self, script: &str) -> DriverResult<()> {
        self.ensure_open()?;
        bounded(
            "add_init_script",
            SCRIPT_TIMEOUT,
            self.page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(script.to_string())),
        )
        .await
        .map(|_| ())
    }

    async fn route(&self, filter: RequestFilter) -> DriverResult<()> {
        self.ensure_open()?;
        let mut paused = bounded(
            "route",
            SCRIPT_TIMEOUT,
            self.page.event_listener::<EventRequestPaused>(),
        )
        .await?;
        bounded(
            "route",
            SCRIPT_TIMEOUT,
            self.page.execute(FetchEnableParams::default()),
        )
        .await?;

        let page = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let request_id = event.request_id.clone();
                let outcome = match filter.decide(&event.request.url) {
                    RouteDecision::Continue => page
                        .execute(ContinueRequestParams::new(request_id))
                        .await
                        .map(|_| ()),
                    RouteDecision::Abort => {
                        tracing::trace!("Blocked request {}", event.request.url);
                        page.execute(FailRequestParams::new(
                            request_id,
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                    }
                };
                if let Err(e) = outcome {
                    tracing::debug!("Request interception reply failed: {}", e);
                }
            }
        });
        self.set_interceptor(Some(AbortOnDrop(task)));
        Ok(())
    }

    async fn count(&self, selector: &str) -> DriverResult<usize> {
        let script = format!(
            "document.querySelectorAll({}).length",
            js_string(selector)
        );
        let value = self.eval("count", &script, SCRIPT_TIMEOUT).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn inner_text(
        &self,
        selector: &str,
        index: usize,
        timeout: Duration,
    ) -> DriverResult<String> {
        let value = self
            .with_element(
                "inner_text",
                selector,
                index,
                "el.innerText || el.textContent || ''",
                timeout,
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn is_visible(&self, selector: &str) -> DriverResult<bool> {
        let body = "(() => { const r = el.getBoundingClientRect(); \
                    const s = getComputedStyle(el); \
                    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' \
                    && s.display !== 'none'; })()";
        match self
            .with_element("is_visible", selector, 0, body, SCRIPT_TIMEOUT)
            .await
        {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(DriverError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn scroll_page(&self, fraction: f64) -> DriverResult<()> {
        let script = format!(
            "(window.scrollBy(0, Math.round(window.innerHeight * {})), true)",
            fraction
        );
        self.eval("scroll_page", &script, SCRIPT_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn scroll_element(&self, selector: &str, fraction: f64) -> DriverResult<()> {
        let body = format!(
            "(el.scrollBy(0, Math.round((el.clientHeight || window.innerHeight) * {})), true)",
            fraction
        );
        self.with_element("scroll_element", selector, 0, &body, SCRIPT_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn press_escape(&self) -> DriverResult<()> {
        self.ensure_open()?;
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let event = escape_key(kind)?;
            bounded("press_escape", SCRIPT_TIMEOUT, self.page.execute(event)).await?;
        }
        Ok(())
    }

    async fn wait_for_timeout(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn title(&self) -> DriverResult<Option<String>> {
        self.ensure_open()?;
        bounded("title", SCRIPT_TIMEOUT, self.page.get_title()).await
    }

    async fn content(&self) -> DriverResult<String> {
        self.ensure_open()?;
        bounded("content", SCRIPT_TIMEOUT, self.page.content()).await
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        self.ensure_open()?;
        bounded(
            "screenshot",
            Duration::from_secs(30),
            self.page
                .screenshot(ScreenshotParams::builder().full_page(true).build()),
        )
        .await
    }

    async fn close(&self) -> DriverResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.set_interceptor(None);

        let closed = bounded("close", SCRIPT_TIMEOUT, self.page.clone().close()).await;
        if let Some(context_id) = self.take_context() {
            dispose_context(&self.browser, context_id).await;
        }
        closed
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let page = self.page.clone();
        let browser = Arc::clone(&self.browser);
        let context_id = self.take_context();
        runtime.spawn(async move {
            if let Err(e) = page.close().await {
                tracing::debug!("Background page close failed: {}", e);
            }
            if let Some(context_id) = context_id {
                dispose_context(&browser, context_id).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_key_events() {
        let down = escape_key(DispatchKeyEventType::KeyDown).unwrap();
        assert_eq!(down.r#type, DispatchKeyEventType::KeyDown);
        assert_eq!(down.key.as_deref(), Some("Escape"));
        assert_eq!(down.code.as_deref(), Some("Escape"));
        assert_eq!(down.windows_virtual_key_code, Some(27));

        let up = escape_key(DispatchKeyEventType::KeyUp).unwrap();
        assert_eq!(up.r#type, DispatchKeyEventType::KeyUp);
    }

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
    }
}
