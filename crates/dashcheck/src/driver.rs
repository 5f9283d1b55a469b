//! Page driver abstraction.
//!
//! The browser engine is a capability interface: navigation, in-page
//! evaluation, request rewriting and event streams. [`crate::cdp::ChromiumDriver`]
//! implements it over the Chrome DevTools Protocol; [`crate::mock::MockDriver`]
//! implements it over an in-memory page model for tests.

use crate::hooks::EventSink;
use crate::result::DashResult;
use crate::script::PageScript;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Conditional-request headers removed from every outgoing request
pub const CONDITIONAL_HEADERS: [&str; 4] = [
    "if-none-match",
    "if-modified-since",
    "if-match",
    "if-unmodified-since",
];

/// How every outgoing request of the session is rewritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPolicy {
    /// `Authorization` header injected into every request
    pub authorization: Option<String>,
    /// Lower-case header names stripped from every request
    pub strip_headers: Vec<String>,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            authorization: None,
            strip_headers: CONDITIONAL_HEADERS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl RequestPolicy {
    /// Apply the policy to a header list
    #[must_use]
    pub fn rewrite(&self, headers: &[(String, String)]) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = headers
            .iter()
            .filter(|(name, _)| {
                let lower = name.to_ascii_lowercase();
                lower != "authorization" || self.authorization.is_none()
            })
            .filter(|(name, _)| !self.strips(name))
            .cloned()
            .collect();
        if let Some(auth) = &self.authorization {
            out.push(("Authorization".to_string(), auth.clone()));
        }
        out
    }

    /// Whether a header is stripped
    #[must_use]
    pub fn strips(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.strip_headers.iter().any(|h| *h == lower)
    }
}

/// Abstract driver trait for one browser page
///
/// # Implementations
///
/// - `ChromiumDriver` - uses the chromiumoxide crate (`browser` feature)
/// - `MockDriver` - in-memory page model for unit testing
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Install the request policy for every subsequent request
    async fn prepare(&mut self, policy: &RequestPolicy) -> DashResult<()>;

    /// Start listeners that feed `sink`; returned tasks are aborted at teardown
    async fn instrument(&mut self, sink: EventSink) -> DashResult<Vec<JoinHandle<()>>>;

    /// Navigate to URL and wait for the load event
    async fn navigate(&mut self, url: &str) -> DashResult<()>;

    /// Wait until no request has been in flight for `quiet`
    async fn wait_for_network_idle(&self, quiet: Duration) -> DashResult<()>;

    /// Evaluate a script in the page context
    async fn evaluate(&self, script: &PageScript) -> DashResult<Value>;

    /// Close the page and its browser context
    async fn close(&mut self) -> DashResult<()>;
}
