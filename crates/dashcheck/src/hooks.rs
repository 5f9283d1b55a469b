//! Instrumentation hooks.
//!
//! Console output, uncaught page errors and allow-listed network traffic are
//! appended to one [`EventSink`] for the whole lifetime of a session. The
//! listener tasks run concurrently with phase execution; recording never
//! blocks on the runner and never fails.

use crate::driver::PageDriver;
use crate::result::DashResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Longest raw payload kept alongside a parse error
const RAW_SNIPPET_LEN: usize = 256;

/// Source of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// `console.*` output
    Console,
    /// Uncaught exception in the page
    PageError,
    /// Outgoing request
    Request,
    /// Received response
    Response,
}

impl EventKind {
    /// Short name used in reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::PageError => "pageError",
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Arrival sequence number, strictly increasing per session
    pub seq: u64,
    /// Event source
    pub kind: EventKind,
    /// Arrival time
    pub timestamp: DateTime<Utc>,
    /// Event body; `{ "parseError": .. }` when the raw payload was malformed
    pub payload: Value,
}

impl EventRecord {
    /// Whether the payload could not be parsed
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        self.payload.get("parseError").is_some()
    }

    /// One-line summary of the payload
    #[must_use]
    pub fn summary(&self) -> String {
        if let Some(err) = self.payload.get("parseError").and_then(Value::as_str) {
            return format!("<malformed: {err}>");
        }
        for key in ["text", "message", "url"] {
            if let Some(text) = self.payload.get(key).and_then(Value::as_str) {
                return match self.payload.get("status").and_then(Value::as_u64) {
                    Some(status) => format!("{status} {text}"),
                    None => text.to_string(),
                };
            }
        }
        self.payload.to_string()
    }
}

/// URL pattern for the network allow-list
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// Contains substring
    Contains(String),
    /// Compiled regex, matched anywhere in the URL
    Regex(regex::Regex),
}

impl UrlPattern {
    /// Compile a regex pattern
    ///
    /// # Errors
    ///
    /// Returns the regex error if the pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        regex::Regex::new(pattern).map(Self::Regex)
    }

    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Contains(pattern) => url.contains(pattern.as_str()),
            Self::Regex(re) => re.is_match(url),
        }
    }
}

#[derive(Debug, Default)]
struct SinkState {
    next_seq: u64,
    records: Vec<EventRecord>,
}

/// Append-only, shareable event log
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    state: Arc<Mutex<SinkState>>,
    allow: Arc<Vec<UrlPattern>>,
}

impl EventSink {
    /// Create a sink that keeps network events matching `allow`
    #[must_use]
    pub fn new(allow: Vec<UrlPattern>) -> Self {
        Self {
            state: Arc::default(),
            allow: Arc::new(allow),
        }
    }

    /// Append an event, returning its sequence number
    pub fn record(&self, kind: EventKind, payload: Value) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.records.push(EventRecord {
            seq,
            kind,
            timestamp: Utc::now(),
            payload,
        });
        seq
    }

    /// Append a raw JSON payload; malformed input is kept as a parse error
    pub fn record_raw(&self, kind: EventKind, raw: &str) -> u64 {
        let payload = serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!(%kind, error = %e, "malformed event payload");
            json!({
                "parseError": e.to_string(),
                "raw": raw.chars().take(RAW_SNIPPET_LEN).collect::<String>(),
            })
        });
        self.record(kind, payload)
    }

    /// Append a network event if its URL is on the allow-list
    pub fn record_network(&self, kind: EventKind, url: &str, payload: Value) -> Option<u64> {
        self.is_interesting(url).then(|| self.record(kind, payload))
    }

    /// Whether a URL is on the allow-list
    #[must_use]
    pub fn is_interesting(&self, url: &str) -> bool {
        self.allow.iter().any(|p| p.matches(url))
    }

    /// Copy of all events in arrival order
    #[must_use]
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }

    /// Number of events captured so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    /// Whether no events were captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of events of one kind
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }
}

/// Listener tasks feeding one [`EventSink`]
#[derive(Debug)]
pub struct Instrumentation {
    sink: EventSink,
    tasks: Vec<JoinHandle<()>>,
}

impl Instrumentation {
    /// Subscribe to the driver's console, page-error and network streams
    pub async fn attach(
        driver: &mut dyn PageDriver,
        allow: Vec<UrlPattern>,
    ) -> DashResult<Self> {
        let sink = EventSink::new(allow);
        let tasks = driver.instrument(sink.clone()).await?;
        tracing::debug!(listeners = tasks.len(), "instrumentation attached");
        Ok(Self { sink, tasks })
    }

    /// The shared sink
    #[must_use]
    pub const fn sink(&self) -> &EventSink {
        &self.sink
    }

    /// Stop all listeners; events captured so far stay in the sink
    pub fn detach(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Instrumentation {
    fn drop(&mut self) {
        self.detach();
    }
}
