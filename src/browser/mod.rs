//! Browser layer
//!
//! # Components
//!
//! - `driver`: the `PageDriver` / `BrowserDriver` traits, errors and the request filter
//! - `device`: mobile and desktop profiles and the scoped context manager
//! - `chromium`: the chromiumoxide backend used in production
//! - `scripted`: a deterministic in-memory backend for tests, built only
//!   for unit tests or with the `testing` feature

mod chromium;
mod device;
mod driver;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use chromium::{ChromiumBrowser, ChromiumPage};
pub use device::{DeviceContext, DeviceProfile, DeviceProfileManager};
pub use driver::{
    BrowserDriver, DriverError, DriverResult, PageDriver, RequestFilter, RouteDecision,
};
