//! Per-step outcome type for the harvesting loops
//!
//! Every browser interaction inside a harvesting loop resolves to one of
//! three outcomes. Skips are expected on hostile pages (missing selectors,
//! slow reads) and the loop carries on; a failure means the page can no
//! longer be used and the current operation ends with what it has.

use crate::browser::{DriverError, DriverResult};

/// Outcome of one step of a harvesting operation
#[derive(Debug)]
pub enum StepOutcome<T> {
    /// The step produced a value
    Success(T),

    /// The step had nothing to offer; continue with the next one
    Skip { reason: String },

    /// The page is unusable; stop the current operation
    Fail(DriverError),
}

impl<T> StepOutcome<T> {
    /// Classifies a driver result
    ///
    /// Transient errors become skips, anything else is a failure.
    pub fn from_result(result: DriverResult<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) if e.is_transient() => Self::Skip {
                reason: e.to_string(),
            },
            Err(e) => Self::Fail(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    /// Returns the value of a successful step
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }
}
