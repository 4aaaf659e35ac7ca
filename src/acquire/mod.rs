//! Live acquisition from the host web application.
//!
//! - [`driver`]: the [`BrowserDriver`] seam and the plain-data DOM views it returns
//! - [`webdriver`]: W3C WebDriver implementation over `reqwest::blocking`
//! - [`probe`]: named selector strategies with capability contracts
//! - [`retry`]: bounded backoff for "not ready yet" polling
//! - [`engine`]: authentication and scroll-to-exhaustion discovery
//! - [`messages`]: turning one discovered conversation into raw records
//!
//! The engine is a small state machine:
//!
//! ```text
//! Unauthenticated → Authenticated → Scanning ⟲ → Exhausted
//!        └──────────────┴───────────────┴──────→ Failed
//! ```
//!
//! Authentication and timeout failures are fatal for the run and are never
//! retried here; the operator re-invokes with adjusted settings.

pub mod driver;
pub mod engine;
pub mod messages;
pub mod probe;
pub mod retry;
pub mod webdriver;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::time::Duration;

pub use driver::{BrowserDriver, DriverError, DriverResult};
pub use engine::{AcquisitionEngine, ScanOutcome, StopReason};
pub use messages::{BrowserMessageSource, MessageSource};
pub use retry::RetryPolicy;
pub use webdriver::WebDriverSession;

/// Lifecycle state of an [`AcquisitionEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unauthenticated,
    Authenticated,
    Scanning,
    Exhausted,
    /// Terminal. Reached on any unhandled automation error.
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::Scanning => "scanning",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Errors raised while acquiring conversations.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("still on login page after injecting tokens ({url})")]
    Authentication { url: String },

    #[error("no content after {}ms (tried: {})", waited.as_millis(), strategies.join(", "))]
    Timeout {
        waited: Duration,
        strategies: Vec<String>,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("cannot {op} while {state}")]
    InvalidState {
        state: EngineState,
        op: &'static str,
    },

    #[error("no messages found for conversation {graph_id}")]
    NoMessages { graph_id: String },
}

/// Result type for acquisition operations.
pub type AcquisitionResult<T> = std::result::Result<T, AcquisitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message() {
        let err = AcquisitionError::InvalidState {
            state: EngineState::Failed,
            op: "scroll",
        };
        assert_eq!(err.to_string(), "cannot scroll while failed");
    }

    #[test]
    fn test_conversion_to_crate_error() {
        let err: crate::Error = AcquisitionError::Timeout {
            waited: Duration::from_millis(1500),
            strategies: vec!["a".into(), "b".into()],
        }
        .into();
        assert_eq!(err.exit_code(), 6);
        assert!(err.to_string().contains("1500ms"));

        let err: crate::Error = AcquisitionError::NoMessages {
            graph_id: "c1".into(),
        }
        .into();
        assert!(!err.is_fatal());
    }
}
