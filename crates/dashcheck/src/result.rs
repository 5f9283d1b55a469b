//! Result and error types for Dashcheck.
//!
//! Only session-level failures are fatal. Everything else is caught at the
//! phase runner's isolation boundary and surfaces as a failing check.

use thiserror::Error;

/// Result type for Dashcheck operations
pub type DashResult<T> = Result<T, DashError>;

/// Errors that can occur while verifying a dashboard
#[derive(Debug, Error)]
pub enum DashError {
    /// Session could not be established (navigation failed or timed out)
    #[error("Could not connect to {url}: {message}")]
    Connectivity {
        /// Target URL
        url: String,
        /// Error message
        message: String,
    },

    /// Probe used after the session was torn down
    #[error("Session is closed")]
    SessionClosed,

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Expected dashboard element is absent
    #[error("Element #{id} not found")]
    ElementNotFound {
        /// Element identifier
        id: String,
    },

    /// Expected page function is absent or not callable
    #[error("Function {name}() is not defined on window")]
    FunctionMissing {
        /// Global function name
        name: String,
    },

    /// In-page function threw
    #[error("{function}() threw: {message}")]
    Invocation {
        /// Function that was invoked
        function: String,
        /// Captured error message
        message: String,
    },

    /// Backend endpoint unreachable or malformed
    #[error("API error (status {status}): {snippet}")]
    Api {
        /// HTTP status (0 when the request never completed)
        status: u16,
        /// Leading part of the response body or transport error
        snippet: String,
    },

    /// Browser-facing operation exceeded its deadline
    #[error("{operation} timed out after {ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Script evaluation failed on the driver side
    #[error("Evaluation failed: {message}")]
    Evaluation {
        /// Error message
        message: String,
    },

    /// Phase selector names no phase in the catalogue
    #[error("Unknown phase '{selector}'")]
    UnknownPhase {
        /// Selector as given
        selector: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DashError {
    /// Whether this error must abort the whole run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connectivity { .. } | Self::SessionClosed | Self::BrowserLaunch { .. }
        )
    }

    /// Create an evaluation error
    #[must_use]
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            ms,
        }
    }
}
