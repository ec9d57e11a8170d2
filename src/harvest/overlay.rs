//! App-wall overlay suppression
//!
//! Three independent layers, each installed best-effort:
//!
//! 1. a request filter that aborts app-download and deep-link requests
//! 2. a stylesheet that force-hides known overlay containers
//! 3. a removal pass, run by a mutation observer inside the page and on
//!    demand through [`OverlaySuppressor::sweep`]
//!
//! The filter and the observer are installed before navigation; the
//! stylesheet goes into each loaded document.

use crate::browser::{PageDriver, RequestFilter};
use crate::config::OverlayConfig;
use crate::{ConfigError, ConfigResult};

/// Which pre-navigation layers were installed on a page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub request_filter: bool,
    pub observer: bool,
}

impl InstallReport {
    pub fn all(&self) -> bool {
        self.request_filter && self.observer
    }
}

/// Installs and re-runs overlay defenses on a page
#[derive(Debug, Clone)]
pub struct OverlaySuppressor {
    filter: RequestFilter,
    stylesheet: String,
    sweep_script: String,
    observer_script: String,
}

impl OverlaySuppressor {
    /// Builds the suppressor from the overlay configuration
    ///
    /// # Returns
    ///
    /// * `Ok(OverlaySuppressor)` - Ready to install
    /// * `Err(ConfigError::InvalidPattern)` - A block pattern does not compile
    pub fn new(config: &OverlayConfig) -> ConfigResult<Self> {
        let filter = RequestFilter::new(&config.block_patterns)
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        let removal = removal_function(config);

        Ok(Self {
            filter,
            stylesheet: hide_stylesheet(&config.hide_selectors),
            sweep_script: format!("({})()", removal),
            observer_script: observer_script(&removal),
        })
    }

    /// Installs the request filter and the observer on a fresh page
    ///
    /// Both outlive navigations, so this runs once before the first `goto`.
    /// Failures are logged and reported, never returned.
    pub async fn install<P: PageDriver + ?Sized>(&self, page: &P) -> InstallReport {
        let mut report = InstallReport::default();

        match page.route(self.filter.clone()).await {
            Ok(()) => report.request_filter = true,
            Err(e) => tracing::warn!("Request filter not installed: {}", e),
        }
        match page.add_init_script(&self.observer_script).await {
            Ok(()) => report.observer = true,
            Err(e) => tracing::warn!("Overlay observer not registered: {}", e),
        }

        tracing::debug!("Overlay suppression installed: {:?}", report);
        report
    }

    /// Injects the hiding stylesheet into the loaded document and clears
    /// whatever overlays are already mounted
    ///
    /// # Returns
    ///
    /// `true` if the stylesheet was injected
    pub async fn suppress<P: PageDriver + ?Sized>(&self, page: &P) -> bool {
        let injected = match page.add_style_tag(&self.stylesheet).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Overlay stylesheet not injected: {}", e);
                false
            }
        };
        self.clear(page).await;
        injected
    }

    /// Runs the removal pass once
    ///
    /// # Returns
    ///
    /// Number of elements removed (0 when the pass could not run)
    pub async fn sweep<P: PageDriver + ?Sized>(&self, page: &P) -> usize {
        match page.evaluate(&self.sweep_script).await {
            Ok(value) => {
                let removed = value.as_u64().unwrap_or(0) as usize;
                if removed > 0 {
                    tracing::debug!("Removed {} overlay elements", removed);
                }
                removed
            }
            Err(e) => {
                tracing::debug!("Overlay sweep failed: {}", e);
                0
            }
        }
    }

    /// Sweeps, then presses Escape to dismiss any remaining dialog
    pub async fn clear<P: PageDriver + ?Sized>(&self, page: &P) -> usize {
        let removed = self.sweep(page).await;
        if let Err(e) = page.press_escape().await {
            tracing::debug!("Escape press failed: {}", e);
        }
        removed
    }

    /// The request filter installed by this suppressor
    pub fn filter(&self) -> &RequestFilter {
        &self.filter
    }
}

fn js_array(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Stylesheet hiding every configured container and restoring scrolling
fn hide_stylesheet(selectors: &[String]) -> String {
    let mut css = String::new();
    if !selectors.is_empty() {
        css.push_str(&selectors.join(", "));
        css.push_str(" { display: none !important; visibility: hidden !important; }\n");
    }
    css.push_str("html, body { overflow: auto !important; }\n");
    css
}

/// JavaScript function source for one removal pass
///
/// Deletes elements matching the configured selectors, plus any fixed or
/// sticky element stacked at or above `min_z_index` that covers more than
/// `coverage` of the viewport in either dimension. Returns the count.
fn removal_function(config: &OverlayConfig) -> String {
    format!(
        r#"function () {{
    const selectors = {selectors};
    const minZ = {min_z};
    const coverage = {coverage};
    let removed = 0;
    for (const sel of selectors) {{
        try {{
            document.querySelectorAll(sel).forEach(el => {{ el.remove(); removed++; }});
        }} catch (_) {{}}
    }}
    const vw = window.innerWidth, vh = window.innerHeight;
    document.querySelectorAll('body *').forEach(el => {{
        const s = getComputedStyle(el);
        if (s.position !== 'fixed' && s.position !== 'sticky') return;
        const z = parseInt(s.zIndex, 10);
        if (isNaN(z) || z < minZ) return;
        if (el.offsetHeight > vh * coverage || el.offsetWidth > vw * coverage) {{
            el.remove();
            removed++;
        }}
    }});
    document.documentElement.style.overflow = 'auto';
    if (document.body) document.body.style.overflow = 'auto';
    return removed;
}}"#,
        selectors = js_array(&config.remove_selectors),
        min_z = config.min_z_index,
        coverage = config.coverage,
    )
}

/// Init script re-running the removal pass after DOM mutations
fn observer_script(removal: &str) -> String {
    format!(
        r#"(() => {{
    const sweep = {removal};
    let pending = false;
    const schedule = () => {{
        if (pending) return;
        pending = true;
        setTimeout(() => {{ pending = false; try {{ sweep(); }} catch (_) {{}} }}, 50);
    }};
    const start = () => {{
        schedule();
        new MutationObserver(schedule).observe(document.documentElement, {{ childList: true, subtree: true }});
    }};
    if (document.documentElement) start();
    else document.addEventListener('DOMContentLoaded', start);
}})()"#,
        removal = removal,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::ScriptedBrowser;
    use crate::browser::{BrowserDriver, DeviceProfile, RouteDecision};

    fn suppressor() -> OverlaySuppressor {
        OverlaySuppressor::new(&OverlayConfig::default()).unwrap()
    }

    #[test]
    fn test_stylesheet_hides_selectors_and_restores_scroll() {
        let css = hide_stylesheet(&["#a".to_string(), ".b".to_string()]);
        assert!(css.starts_with("#a, .b { display: none !important;"));
        assert!(css.contains("overflow: auto !important"));
    }

    #[test]
    fn test_removal_script_embeds_config() {
        let config = OverlayConfig::default();
        let script = removal_function(&config);
        assert!(script.contains("div[role='dialog']"));
        assert!(script.contains("const minZ = 1000;"));
        assert!(script.contains("const coverage = 0.6;"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config = OverlayConfig {
            block_patterns: vec!["(".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            OverlaySuppressor::new(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[tokio::test]
    async fn test_install_all_layers() {
        let browser = ScriptedBrowser::new();
        let page = browser
            .open_context(&DeviceProfile::Mobile.context())
            .await
            .unwrap();

        let report = suppressor().install(&page).await;
        assert!(report.all());
        assert_eq!(browser.injections(), (0, 1));
        assert!(suppressor().suppress(&page).await);
        assert_eq!(browser.injections(), (1, 1));

        let routes = browser.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(
            routes[0].decide("https://example.com/app-download?x=1"),
            RouteDecision::Abort
        );
    }

    #[tokio::test]
    async fn test_install_failures_are_not_fatal() {
        let browser = ScriptedBrowser::new();
        browser.fail_installs(true);
        let page = browser
            .open_context(&DeviceProfile::Desktop.context())
            .await
            .unwrap();

        let report = suppressor().install(&page).await;
        assert_eq!(report, InstallReport::default());

        // The removal pass still runs without the stylesheet
        assert!(!suppressor().suppress(&page).await);
        assert_eq!(browser.evaluations(), 1);
    }
}
