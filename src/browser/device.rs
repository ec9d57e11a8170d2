//! Device profiles and scoped browsing contexts
//!
//! Pages get a mobile context first; the desktop context is the single
//! fallback (it sometimes avoids mobile-only app walls).

use crate::browser::driver::{BrowserDriver, DriverResult, PageDriver};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Mobile Safari/537.36";

const DESKTOP_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// The two canonical device profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProfile {
    Mobile,
    Desktop,
}

impl DeviceProfile {
    /// Profiles in the order a crawl tries them: default first, then the
    /// single fallback
    pub const FALLBACK_CHAIN: [DeviceProfile; 2] = [DeviceProfile::Mobile, DeviceProfile::Desktop];

    /// Canonical context attributes for this profile
    pub fn context(&self) -> DeviceContext {
        match self {
            Self::Mobile => DeviceContext {
                profile: *self,
                width: 412,
                height: 915,
                device_scale_factor: 2.625,
                is_mobile: true,
                has_touch: true,
                user_agent: ANDROID_UA.to_string(),
            },
            Self::Desktop => DeviceContext {
                profile: *self,
                width: 1366,
                height: 900,
                device_scale_factor: 1.0,
                is_mobile: false,
                has_touch: false,
                user_agent: DESKTOP_UA.to_string(),
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Desktop => "desktop",
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::Mobile
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emulated device attributes of one browsing context
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceContext {
    pub profile: DeviceProfile,
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub is_mobile: bool,
    pub has_touch: bool,
    pub user_agent: String,
}

/// Hands out one browsing context per crawl attempt
pub struct DeviceProfileManager<B: BrowserDriver> {
    browser: Arc<B>,
}

impl<B: BrowserDriver> Clone for DeviceProfileManager<B> {
    fn clone(&self) -> Self {
        Self {
            browser: Arc::clone(&self.browser),
        }
    }
}

impl<B: BrowserDriver> DeviceProfileManager<B> {
    pub fn new(browser: Arc<B>) -> Self {
        Self { browser }
    }

    /// Opens a fresh context for `profile` and runs `attempt` inside it
    ///
    /// The context is closed once the attempt finishes, whatever it
    /// returned. `attempt` reports its own failures through `T`, so there
    /// is no early exit between opening and closing.
    ///
    /// # Arguments
    ///
    /// * `profile` - Device profile to emulate
    /// * `attempt` - The work to run against the page
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The attempt's result
    /// * `Err(DriverError)` - The context could not be created
    pub async fn with_context<F, Fut, T>(&self, profile: DeviceProfile, attempt: F) -> DriverResult<T>
    where
        F: FnOnce(Arc<B::Page>) -> Fut,
        Fut: Future<Output = T>,
    {
        let device = profile.context();
        let page = Arc::new(self.browser.open_context(&device).await?);
        tracing::debug!(
            "Opened {} context ({}x{})",
            profile,
            device.width,
            device.height
        );

        let outcome = attempt(Arc::clone(&page)).await;

        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close {} context: {}", profile, e);
        } else {
            tracing::debug!("Closed {} context", profile);
        }

        Ok(outcome)
    }
}
