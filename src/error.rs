//! Error types for the browser test harness.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webdriver_harness::{Browser, Call, Locator, Result};
//!
//! async fn example(browser: &Browser) -> Result<()> {
//!     let element = browser.find_element(Locator::css("#submit")).await?;
//!     element.click(Call::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Transient interaction | [`Error::Transient`] |
//! | Waiting | [`Error::WaitTimeout`] |
//! | Configuration | [`Error::Config`] |
//! | Usage | [`Error::Usage`] |
//! | Driver | [`Error::Driver`], [`Error::NoDialog`] |
//! | Artifacts | [`Error::Artifact`] |
//! | Validation | [`Error::Validation`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Transient Kinds
// ============================================================================

/// Kinds of transient remote-interaction failures.
///
/// These are the failures a remote driver raises while the page is still
/// settling. They are retried by a proxy with an explicit-retry timeout
/// and swallowed by [`wait_for`](crate::wait::wait_for) until its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// The locator matched no element (yet).
    ElementNotFound,
    /// The element reference is no longer attached to the DOM.
    StaleElement,
    /// The selector was rejected by the remote end.
    InvalidSelector,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ElementNotFound => "element not found",
            Self::StaleElement => "stale element",
            Self::InvalidSelector => "invalid selector",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Transient Interaction Errors
    // ========================================================================
    /// Retryable remote-interaction failure.
    ///
    /// Absorbed by the retry loop while budget remains; past the budget
    /// the last observed instance is surfaced to the caller.
    #[error("Transient failure ({kind}): {message}")]
    Transient {
        /// What kind of transient condition was hit.
        kind: TransientKind,
        /// Description from the remote end.
        message: String,
    },

    // ========================================================================
    // Wait Errors
    // ========================================================================
    /// A wait-for-* helper's deadline elapsed.
    #[error("Timed out after {elapsed_ms}ms waiting for {operation}")]
    WaitTimeout {
        /// Description of the condition waited for.
        operation: String,
        /// Milliseconds actually elapsed before giving up.
        elapsed_ms: u64,
        /// Last error observed from the probe, if any.
        #[source]
        last: Option<Box<Error>>,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the environment selection is incomplete or invalid,
    /// e.g. the Internet Explorer kind without a remote endpoint.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Usage Errors
    // ========================================================================
    /// Invalid argument shape at an API boundary.
    #[error("Usage error: {message}")]
    Usage {
        /// Description of the misuse.
        message: String,
    },

    // ========================================================================
    // Driver Errors
    // ========================================================================
    /// Non-retryable failure surfaced by the underlying driver.
    #[error("Driver error: {message}")]
    Driver {
        /// Description from the driver.
        message: String,
    },

    /// No modal dialog is currently open.
    ///
    /// Dialog presence is only observable through this error state;
    /// [`wait_for_dialog`](crate::harness::TestContext::wait_for_dialog)
    /// polls until it stops occurring.
    #[error("No modal dialog present")]
    NoDialog,

    /// A background driver call was dropped before completing.
    #[error("Background driver call aborted")]
    TaskAborted,

    // ========================================================================
    // Artifact Errors
    // ========================================================================
    /// Artifact archive location missing or invalid.
    #[error("Artifact error: {message}")]
    Artifact {
        /// Description of the artifact problem.
        message: String,
    },

    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// The HTML validator reported markup errors.
    #[error("HTML validation failed with {error_count} error(s)")]
    Validation {
        /// Error count reported by the validator.
        error_count: u32,
        /// Raw validator response body.
        report: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error from the validator client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a transient interaction error.
    #[inline]
    pub fn transient(kind: TransientKind, message: impl Into<String>) -> Self {
        Self::Transient {
            kind,
            message: message.into(),
        }
    }

    /// Creates an element-not-found transient error.
    #[inline]
    pub fn element_not_found(locator: impl fmt::Display) -> Self {
        Self::Transient {
            kind: TransientKind::ElementNotFound,
            message: format!("no element matches {locator}"),
        }
    }

    /// Creates a stale-element transient error.
    #[inline]
    pub fn stale_element(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::StaleElement,
            message: message.into(),
        }
    }

    /// Creates an invalid-selector transient error.
    #[inline]
    pub fn invalid_selector(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::InvalidSelector,
            message: message.into(),
        }
    }

    /// Creates a wait timeout error.
    #[inline]
    pub fn wait_timeout(
        operation: impl Into<String>,
        elapsed_ms: u64,
        last: Option<Error>,
    ) -> Self {
        Self::WaitTimeout {
            operation: operation.into(),
            elapsed_ms,
            last: last.map(Box::new),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a usage error.
    #[inline]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Creates a driver error.
    #[inline]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Creates an artifact error.
    #[inline]
    pub fn artifact(message: impl Into<String>) -> Self {
        Self::Artifact {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a retryable remote-interaction error.
    ///
    /// This is the default transient classification; backends may widen
    /// or narrow it through
    /// [`Backend::classify`](crate::backend::Backend::classify).
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns `true` if this is a wait timeout.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }

    /// Returns `true` if this signals the absence of a modal dialog.
    #[inline]
    #[must_use]
    pub fn is_no_dialog(&self) -> bool {
        matches!(self, Self::NoDialog)
    }

    /// Returns the transient kind, if this is a transient error.
    #[inline]
    #[must_use]
    pub fn transient_kind(&self) -> Option<TransientKind> {
        match self {
            Self::Transient { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_transient_display() {
        let err = Error::element_not_found("css:#missing");
        assert_eq!(
            err.to_string(),
            "Transient failure (element not found): no element matches css:#missing"
        );
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("remote endpoint missing");
        assert_eq!(err.to_string(), "Configuration error: remote endpoint missing");
    }

    #[test]
    fn test_wait_timeout_carries_last_error() {
        let last = Error::stale_element("element gone");
        let err = Error::wait_timeout("window count", 5000, Some(last));

        assert!(err.is_timeout());
        match err {
            Error::WaitTimeout { last: Some(inner), elapsed_ms, .. } => {
                assert_eq!(elapsed_ms, 5000);
                assert!(inner.is_transient());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_is_transient() {
        assert!(Error::element_not_found("x").is_transient());
        assert!(Error::stale_element("x").is_transient());
        assert!(Error::invalid_selector("x").is_transient());
        assert!(!Error::driver("boom").is_transient());
        assert!(!Error::NoDialog.is_transient());
    }

    #[test]
    fn test_transient_kind_accessor() {
        let err = Error::stale_element("detached");
        assert_eq!(err.transient_kind(), Some(TransientKind::StaleElement));
        assert_eq!(Error::driver("x").transient_kind(), None);
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
