//! Scripted mock driver.
//!
//! [`MockPage`] is an in-memory model of a dashboard page: elements, global
//! functions, arrays, the live channel and backend responses. [`MockDriver`]
//! interprets [`PageScript`]s against it, so the whole engine can be run
//! without a browser.
//!
//! # Example
//!
//! ```
//! use dashcheck::mock::{MockDriver, MockPage};
//!
//! let driver = MockDriver::new(MockPage::compliant().without_element("world-map"));
//! assert!(!driver.with_page(|p| p.elements.contains_key("world-map")));
//! ```

use crate::driver::{PageDriver, RequestPolicy};
use crate::hooks::{EventKind, EventSink};
use crate::result::{DashError, DashResult};
use crate::script::{ChannelState, ElementState, FetchResult, PageScript};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Behavior of a page-global function: `Err` is the thrown message
pub type MockFunction = Arc<dyn Fn(&[Value], &mut MockPage) -> Result<Value, String> + Send + Sync>;

/// How navigation behaves
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Navigation {
    /// Loads normally
    #[default]
    Ready,
    /// Fails immediately with a message
    Fail(String),
    /// Never completes
    Hang,
}

/// How closing the page behaves
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Teardown {
    /// Closes normally
    #[default]
    Clean,
    /// Fails with a message (the page is still marked closed)
    Fail(String),
    /// Never completes
    Hang,
}

/// In-memory dashboard page
#[derive(Clone, Default)]
pub struct MockPage {
    /// Elements by identifier
    pub elements: HashMap<String, ElementState>,
    functions: HashMap<String, MockFunction>,
    /// Page-global arrays by name, tracked by length
    pub arrays: HashMap<String, usize>,
    /// Page-global channel objects by name
    pub channels: HashMap<String, ChannelState>,
    /// Rendered body text
    pub body_text: String,
    /// Backend responses keyed by path
    pub responses: HashMap<String, FetchResult>,
    /// Navigation behavior
    pub navigation: Navigation,
    /// Close behavior
    pub teardown: Teardown,
    /// Events emitted as soon as instrumentation attaches (`kind`, raw JSON)
    pub startup_events: Vec<(EventKind, String)>,
    /// Scripts that answer only after a delay, keyed by [`PageScript::label`]
    pub slow: HashMap<String, Duration>,
    /// Expected `Authorization` header for backend requests
    pub required_auth: Option<String>,
    /// Call history for verification
    pub calls: Vec<String>,
    /// Policy installed by `prepare`
    pub policy: Option<RequestPolicy>,
    /// Whether `close` was called
    pub closed: bool,
    sink: Option<EventSink>,
}

impl std::fmt::Debug for MockPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut functions: Vec<_> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("MockPage")
            .field("elements", &self.elements.len())
            .field("functions", &functions)
            .field("navigation", &self.navigation)
            .field("closed", &self.closed)
            .finish()
    }
}

fn ok(_: &[Value], _: &mut MockPage) -> Result<Value, String> {
    Ok(Value::Null)
}

fn stats_body() -> Value {
    json!({
        "total_connections": 1204,
        "failed_logins": 980,
        "successful_logins": 12,
        "commands_executed": 57,
        "unique_ips": 311,
        "unique_passwords": 402,
        "unique_users": 58,
        "success_rate": 1.21,
        "recent_attacks": [
            { "ip": "198.51.100.4", "event": "connection", "latitude": 35.68, "longitude": 139.69, "country": "Japan" },
            { "ip": "198.51.100.9", "event": "login.failed", "latitude": null, "longitude": null, "country": "Unknown" },
            { "ip": "192.0.2.33", "event": "login.failed", "latitude": 48.85, "longitude": 2.35, "country": "France" }
        ],
        "alerts": [
            { "level": "HIGH", "message": "High frequency attacks from 198.51.100.4" }
        ],
        "top_countries": { "Japan": 40, "France": 22 },
        "top_organizations": { "Example Hosting": 31 },
        "top_passwords": { "123456": 90, "admin": 61 },
        "top_ips": { "198.51.100.4": 44 },
        "top_users": { "root": 300 },
        "map_data": { "markers": [], "heatpoints": [] }
    })
}

impl MockPage {
    /// An empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A dashboard that honors the whole contract
    #[must_use]
    pub fn compliant() -> Self {
        let mut page = Self::new()
            .with_element("world-map", ElementState::rendered(0, ""))
            .with_element(
                "large-world-map",
                ElementState::rendered(120, "Leaflet | OpenStreetMap"),
            )
            .with_element("attack-count", ElementState::rendered(2, "42"))
            .with_element("timeline-chart", ElementState::rendered(64, ""))
            .with_element("total-connections", ElementState::rendered(5, "1,204"))
            .with_element("failed-logins", ElementState::rendered(3, "980"))
            .with_element("successful-logins", ElementState::rendered(2, "12"))
            .with_element("unique-ips", ElementState::rendered(3, "311"));

        for list in ["passwords", "countries", "organizations", "ips", "users"] {
            page = page.with_element(
                &format!("top-{list}"),
                ElementState::rendered(80, "1. entry 10"),
            );
        }

        page = page
            .with_function("initializeMaps", |_, p| {
                p.elements.insert(
                    "world-map".into(),
                    ElementState::rendered(512, "Leaflet | OpenStreetMap"),
                );
                p.arrays.entry("attackMarkers".into()).or_insert(0);
                Ok(Value::Null)
            })
            .with_function("addAttackMarker", |args, p| {
                let attack = args.first().cloned().unwrap_or(Value::Null);
                if !(attack["latitude"].is_number() && attack["longitude"].is_number()) {
                    return Err("invalid coordinates".into());
                }
                *p.arrays.entry("attackMarkers".into()).or_insert(0) += 1;
                p.console(&format!("marker added for {}", attack["ip"]));
                Ok(Value::Null)
            })
            .with_function("resetMap", |_, p| {
                p.arrays.insert("attackMarkers".into(), 0);
                Ok(Value::Null)
            })
            .with_function("toggleHeatmap", ok)
            .with_function("updateTimelineChart", |args, _| match args.first() {
                Some(Value::Array(_)) => Ok(Value::Null),
                _ => Err("events.forEach is not a function".into()),
            })
            .with_function("updateTopPasswords", ok)
            .with_function("updateTopCountries", ok)
            .with_function("updateTopOrganizations", ok)
            .with_function("updateTopIPs", ok)
            .with_function("updateTopUsers", ok)
            .with_function("exportLogs", ok)
            .with_function("exportAlerts", ok)
            .with_function("exportCredentials", ok)
            .with_function("loadInitialData", ok)
            .with_function("io", ok)
            .with_channel(
                "socket",
                ChannelState {
                    exists: true,
                    connected: Some(true),
                    id: Some("kX9qL2mZ".into()),
                },
            )
            .with_response("/api/stats", 200, &stats_body().to_string())
            .with_response(
                "/api/health",
                200,
                r#"{"status":"healthy","monitor_running":true,"log_file_exists":true}"#,
            );
        page.body_text =
            "Cowrie Live Dashboard\nExport Logs Export Alerts Export Credentials\n1,204 connections"
                .to_string();
        page
    }

    /// Add or replace an element
    #[must_use]
    pub fn with_element(mut self, id: &str, state: ElementState) -> Self {
        self.elements.insert(id.to_string(), state);
        self
    }

    /// Remove an element
    #[must_use]
    pub fn without_element(mut self, id: &str) -> Self {
        self.elements.remove(id);
        self
    }

    /// Add or replace a global function
    #[must_use]
    pub fn with_function<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[Value], &mut MockPage) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Remove a global function
    #[must_use]
    pub fn without_function(mut self, name: &str) -> Self {
        self.functions.remove(name);
        self
    }

    /// Add or replace a channel object
    #[must_use]
    pub fn with_channel(mut self, global: &str, state: ChannelState) -> Self {
        self.channels.insert(global.to_string(), state);
        self
    }

    /// Add or replace a backend response
    #[must_use]
    pub fn with_response(mut self, path: &str, status: u16, body: &str) -> Self {
        self.responses.insert(
            path.to_string(),
            FetchResult {
                status,
                body: body.to_string(),
                error: None,
            },
        );
        self
    }

    /// Set navigation behavior
    #[must_use]
    pub fn with_navigation(mut self, navigation: Navigation) -> Self {
        self.navigation = navigation;
        self
    }

    /// Set close behavior
    #[must_use]
    pub fn with_teardown(mut self, teardown: Teardown) -> Self {
        self.teardown = teardown;
        self
    }

    /// Emit an event when instrumentation attaches
    #[must_use]
    pub fn with_startup_event(mut self, kind: EventKind, raw: &str) -> Self {
        self.startup_events.push((kind, raw.to_string()));
        self
    }

    /// Delay answers to the script with this label
    #[must_use]
    pub fn with_slow_script(mut self, label: &str, delay: Duration) -> Self {
        self.slow.insert(label.to_string(), delay);
        self
    }

    /// Require this `Authorization` header on backend requests
    #[must_use]
    pub fn with_required_auth(mut self, header: &str) -> Self {
        self.required_auth = Some(header.to_string());
        self
    }

    /// Log to the page console (recorded once instrumentation is attached)
    pub fn console(&self, text: &str) {
        if let Some(sink) = &self.sink {
            sink.record(EventKind::Console, json!({ "level": "log", "text": text }));
        }
    }

    /// Raise an uncaught page error
    pub fn page_error(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink.record(EventKind::PageError, json!({ "message": message }));
        }
    }

    fn invoke(&mut self, function: &str, args: &[Value]) -> Value {
        self.calls.push(format!("invoke:{function}"));
        let Some(f) = self.functions.get(function).cloned() else {
            return json!({ "ok": false, "missing": true, "value": null, "error": null });
        };
        match f(args, self) {
            Ok(value) => json!({ "ok": true, "missing": false, "value": value, "error": null }),
            Err(error) => json!({ "ok": false, "missing": false, "value": null, "error": error }),
        }
    }

    fn fetch(&mut self, url: &str) -> FetchResult {
        self.calls.push(format!("fetch:{url}"));
        let authorized = match &self.required_auth {
            None => true,
            Some(expected) => self
                .policy
                .as_ref()
                .and_then(|p| p.authorization.as_ref())
                .is_some_and(|actual| actual == expected),
        };
        let result = if authorized {
            let mut paths: Vec<_> = self.responses.keys().collect();
            paths.sort_by_key(|p| std::cmp::Reverse(p.len()));
            paths
                .into_iter()
                .find(|path| url.ends_with(path.as_str()))
                .and_then(|path| self.responses.get(path))
                .cloned()
                .unwrap_or_else(|| FetchResult {
                    status: 404,
                    body: "Not Found".into(),
                    error: None,
                })
        } else {
            FetchResult {
                status: 401,
                body: "Authentication required".into(),
                error: None,
            }
        };
        if let Some(sink) = &self.sink {
            sink.record_network(EventKind::Request, url, json!({ "url": url, "method": "GET" }));
            sink.record_network(
                EventKind::Response,
                url,
                json!({ "url": url, "status": result.status }),
            );
        }
        result
    }

    fn interpret(&mut self, script: &PageScript) -> DashResult<Value> {
        let value = match script {
            PageScript::ElementState { id } => {
                serde_json::to_value(self.elements.get(id).cloned().unwrap_or_default())?
            }
            PageScript::IsCallable { name } => Value::Bool(self.functions.contains_key(name)),
            PageScript::Invoke { function, args } => self.invoke(function, args),
            PageScript::ArrayLength { global } => self
                .arrays
                .get(global)
                .map_or(Value::Null, |len| json!(len)),
            PageScript::ChannelState { global } => {
                serde_json::to_value(self.channels.get(global).cloned().unwrap_or_default())?
            }
            PageScript::BodyText => Value::String(self.body_text.clone()),
            PageScript::Fetch { url } => serde_json::to_value(self.fetch(url))?,
        };
        Ok(value)
    }
}

/// Mock driver sharing one [`MockPage`] with every clone
#[derive(Debug, Clone)]
pub struct MockDriver {
    page: Arc<Mutex<MockPage>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new(MockPage::compliant())
    }
}

impl MockDriver {
    /// Create a driver over a page model
    #[must_use]
    pub fn new(page: MockPage) -> Self {
        Self {
            page: Arc::new(Mutex::new(page)),
        }
    }

    /// Inspect or modify the page model
    pub fn with_page<R>(&self, f: impl FnOnce(&mut MockPage) -> R) -> R {
        let mut page = self.page.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut page)
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.with_page(|p| p.calls.clone())
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.with_page(|p| p.calls.iter().any(|c| c.starts_with(method)))
    }

    /// Whether the driver has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.with_page(|p| p.closed)
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn prepare(&mut self, policy: &RequestPolicy) -> DashResult<()> {
        self.with_page(|p| {
            p.calls.push("prepare".to_string());
            p.policy = Some(policy.clone());
        });
        Ok(())
    }

    async fn instrument(&mut self, sink: EventSink) -> DashResult<Vec<JoinHandle<()>>> {
        self.with_page(|p| {
            p.calls.push("instrument".to_string());
            for (kind, raw) in &p.startup_events {
                sink.record_raw(*kind, raw);
            }
            p.sink = Some(sink);
        });
        Ok(Vec::new())
    }

    async fn navigate(&mut self, url: &str) -> DashResult<()> {
        let navigation = self.with_page(|p| {
            p.calls.push(format!("navigate:{url}"));
            p.navigation.clone()
        });
        match navigation {
            Navigation::Ready => Ok(()),
            Navigation::Fail(message) => Err(DashError::Connectivity {
                url: url.to_string(),
                message,
            }),
            Navigation::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    async fn wait_for_network_idle(&self, _quiet: Duration) -> DashResult<()> {
        Ok(())
    }

    async fn evaluate(&self, script: &PageScript) -> DashResult<Value> {
        let delay = self.with_page(|p| p.slow.get(&script.label()).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut page = self.page.lock().unwrap_or_else(PoisonError::into_inner);
        page.interpret(script)
    }

    async fn close(&mut self) -> DashResult<()> {
        let teardown = self.with_page(|p| {
            p.calls.push("close".to_string());
            p.closed = true;
            p.sink = None;
            p.teardown.clone()
        });
        match teardown {
            Teardown::Clean => Ok(()),
            Teardown::Fail(message) => Err(DashError::Evaluation { message }),
            Teardown::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_renders_map() {
        let driver = MockDriver::default();
        let before = driver
            .evaluate(&PageScript::element("world-map"))
            .await
            .unwrap();
        assert_eq!(before["html_len"], 0);

        driver
            .evaluate(&PageScript::invoke("initializeMaps", vec![]))
            .await
            .unwrap();
        let after = driver
            .evaluate(&PageScript::element("world-map"))
            .await
            .unwrap();
        assert!(after["html_len"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_invoke_missing_and_throwing() {
        let driver = MockDriver::new(
            MockPage::new().with_function("boom", |_, _| Err("kaboom".to_string())),
        );
        let missing = driver
            .evaluate(&PageScript::invoke("nope", vec![]))
            .await
            .unwrap();
        assert_eq!(missing["missing"], true);

        let thrown = driver
            .evaluate(&PageScript::invoke("boom", vec![]))
            .await
            .unwrap();
        assert_eq!(thrown["ok"], false);
        assert_eq!(thrown["error"], "kaboom");
    }

    #[tokio::test]
    async fn test_fetch_requires_auth() {
        let mut driver = MockDriver::new(
            MockPage::compliant().with_required_auth("Basic YWRtaW46c2VjcmV0"),
        );
        let denied = driver
            .evaluate(&PageScript::Fetch {
                url: "http://localhost:3333/api/stats".into(),
            })
            .await
            .unwrap();
        assert_eq!(denied["status"], 401);

        driver
            .prepare(&RequestPolicy {
                authorization: Some("Basic YWRtaW46c2VjcmV0".into()),
                ..RequestPolicy::default()
            })
            .await
            .unwrap();
        let allowed = driver
            .evaluate(&PageScript::Fetch {
                url: "http://localhost:3333/api/stats".into(),
            })
            .await
            .unwrap();
        assert_eq!(allowed["status"], 200);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let driver = MockDriver::default();
        let result = driver
            .evaluate(&PageScript::Fetch {
                url: "http://localhost:3333/api/missing".into(),
            })
            .await
            .unwrap();
        assert_eq!(result["status"], 404);
    }

    #[tokio::test]
    async fn test_close_is_recorded() {
        let mut driver = MockDriver::default();
        let observer = driver.clone();
        driver.close().await.unwrap();
        assert!(observer.is_closed());
        assert!(observer.was_called("close"));
    }
}
