//! Chromium driver over the Chrome DevTools Protocol.
//!
//! Requests are intercepted with the Fetch domain so the [`RequestPolicy`]
//! applies to every request the page makes, including its own XHR and
//! socket polling. The HTTP cache is disabled for the whole session.

use crate::config::BrowserConfig;
use crate::driver::{PageDriver, RequestPolicy};
use crate::hooks::{EventKind, EventSink};
use crate::result::{DashError, DashResult};
use crate::script::PageScript;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused, HeaderEntry,
    RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventLoadingFailed, EventLoadingFinished,
    EventRequestWillBeSent, EventResponseReceived, SetCacheDisabledParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    EvaluateParams, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::Page as CdpPage;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Poll interval while waiting for network idle
const IDLE_POLL: Duration = Duration::from_millis(50);

fn launch_error(e: impl std::fmt::Display) -> DashError {
    DashError::BrowserLaunch {
        message: e.to_string(),
    }
}

fn cdp_error(e: impl std::fmt::Display) -> DashError {
    DashError::evaluation(e.to_string())
}

#[derive(Debug)]
struct Traffic {
    in_flight: HashSet<String>,
    last_activity: Instant,
}

impl Traffic {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Poll the CDP handler until the connection closes, returning how many
/// message errors were skipped. Handler errors are per-message.
async fn drive_handler<S, E>(handler: &mut S) -> usize
where
    S: Stream<Item = Result<(), E>> + Unpin,
    E: std::fmt::Display,
{
    let mut errors = 0;
    while let Some(event) = handler.next().await {
        if let Err(err) = event {
            errors += 1;
            tracing::debug!(error = %err, "cdp handler error");
        }
    }
    errors
}

/// Serialize a protocol event; failures are kept as parse errors
fn event_payload<T: Serialize>(event: &T) -> Value {
    serde_json::to_value(event).unwrap_or_else(|e| json!({ "parseError": e.to_string() }))
}

fn console_payload(raw: &Value) -> Value {
    if raw.get("parseError").is_some() {
        return raw.clone();
    }
    let text = raw["args"]
        .as_array()
        .map(|args| {
            args.iter()
                .map(|a| match (&a["value"], a["description"].as_str()) {
                    (Value::String(s), _) => s.clone(),
                    (Value::Null, Some(d)) => d.to_string(),
                    (Value::Null, None) => a["type"].as_str().unwrap_or("undefined").to_string(),
                    (v, _) => v.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    json!({ "level": raw["type"], "text": text })
}

fn exception_payload(raw: &Value) -> Value {
    if raw.get("parseError").is_some() {
        return raw.clone();
    }
    let details = &raw["exceptionDetails"];
    let message = details["exception"]["description"]
        .as_str()
        .or_else(|| details["text"].as_str())
        .unwrap_or("uncaught exception");
    json!({
        "message": message,
        "url": details["url"],
        "line": details["lineNumber"],
    })
}

fn request_headers(raw: &Value) -> Vec<(String, String)> {
    raw.as_object()
        .map(|headers| {
            headers
                .iter()
                .map(|(k, v)| {
                    let value = v.as_str().map_or_else(|| v.to_string(), ToString::to_string);
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Page driver backed by a launched Chromium
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: Arc<Mutex<CdpBrowser>>,
    page: Mutex<Option<CdpPage>>,
    handler: JoinHandle<()>,
    background: Vec<JoinHandle<()>>,
    traffic: Arc<StdMutex<Traffic>>,
}

impl ChromiumDriver {
    /// Launch Chromium and open a blank page
    ///
    /// # Errors
    ///
    /// Returns [`DashError::BrowserLaunch`] if the browser cannot be started.
    pub async fn launch(config: &BrowserConfig) -> DashResult<Self> {
        let mut builder =
            CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(launch_error)?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(launch_error)?;
        let handler = tokio::spawn(async move {
            drive_handler(&mut handler).await;
        });

        let page = browser.new_page("about:blank").await.map_err(launch_error)?;
        tracing::debug!(headless = config.headless, "chromium launched");

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            page: Mutex::new(Some(page)),
            handler,
            background: Vec::new(),
            traffic: Arc::new(StdMutex::new(Traffic {
                in_flight: HashSet::new(),
                last_activity: Instant::now(),
            })),
        })
    }

    async fn page(&self) -> DashResult<CdpPage> {
        self.page.lock().await.clone().ok_or(DashError::SessionClosed)
    }

    fn spawn_traffic_tracker(
        &mut self,
        mut sent: EventStream<EventRequestWillBeSent>,
        mut finished: EventStream<EventLoadingFinished>,
        mut failed: EventStream<EventLoadingFailed>,
    ) {
        let traffic = Arc::clone(&self.traffic);
        self.background.push(tokio::spawn(async move {
            loop {
                let (id, starting) = tokio::select! {
                    Some(ev) = sent.next() => (ev.request_id.inner().clone(), true),
                    Some(ev) = finished.next() => (ev.request_id.inner().clone(), false),
                    Some(ev) = failed.next() => (ev.request_id.inner().clone(), false),
                    else => break,
                };
                let mut t = traffic.lock().unwrap_or_else(PoisonError::into_inner);
                if starting {
                    t.in_flight.insert(id);
                } else {
                    t.in_flight.remove(&id);
                }
                t.touch();
            }
        }));
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn prepare(&mut self, policy: &RequestPolicy) -> DashResult<()> {
        let page = self.page().await?;
        page.execute(NetworkEnableParams::default())
            .await
            .map_err(cdp_error)?;
        page.execute(SetCacheDisabledParams::new(true))
            .await
            .map_err(cdp_error)?;

        let sent = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(cdp_error)?;
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(cdp_error)?;
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(cdp_error)?;
        self.spawn_traffic_tracker(sent, finished, failed);

        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(cdp_error)?;
        page.execute(
            FetchEnableParams::builder()
                .pattern(RequestPattern::builder().url_pattern("*").build())
                .build(),
        )
        .await
        .map_err(cdp_error)?;

        let rewrite = policy.clone();
        let intercept_page = page.clone();
        self.background.push(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let headers = request_headers(&event_payload(&event.request.headers));
                let entries: Vec<HeaderEntry> = rewrite
                    .rewrite(&headers)
                    .into_iter()
                    .map(|(name, value)| HeaderEntry::new(name, value))
                    .collect();
                let params = match ContinueRequestParams::builder()
                    .request_id(event.request_id.clone())
                    .headers(entries)
                    .build()
                {
                    Ok(params) => params,
                    Err(e) => {
                        tracing::warn!(error = %e, "could not build continue request");
                        continue;
                    }
                };
                if let Err(e) = intercept_page.execute(params).await {
                    tracing::warn!(error = %e, url = %event.request.url, "continue request failed");
                }
            }
        }));

        tracing::debug!(
            authorization = policy.authorization.is_some(),
            "request policy installed"
        );
        Ok(())
    }

    async fn instrument(&mut self, sink: EventSink) -> DashResult<Vec<JoinHandle<()>>> {
        let page = self.page().await?;
        let mut console = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(cdp_error)?;
        let mut exceptions = page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(cdp_error)?;
        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(cdp_error)?;
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(cdp_error)?;

        let console_sink = sink.clone();
        let errors_sink = sink.clone();
        let network_sink = sink;
        Ok(vec![
            tokio::spawn(async move {
                while let Some(event) = console.next().await {
                    let raw = event_payload(&*event);
                    console_sink.record(EventKind::Console, console_payload(&raw));
                }
            }),
            tokio::spawn(async move {
                while let Some(event) = exceptions.next().await {
                    let raw = event_payload(&*event);
                    errors_sink.record(EventKind::PageError, exception_payload(&raw));
                }
            }),
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(event) = requests.next() => {
                            let url = event.request.url.clone();
                            network_sink.record_network(
                                EventKind::Request,
                                &url,
                                json!({ "url": url, "method": event.request.method }),
                            );
                        }
                        Some(event) = responses.next() => {
                            let url = event.response.url.clone();
                            network_sink.record_network(
                                EventKind::Response,
                                &url,
                                json!({ "url": url, "status": event.response.status }),
                            );
                        }
                        else => break,
                    }
                }
            }),
        ])
    }

    async fn navigate(&mut self, url: &str) -> DashResult<()> {
        let page = self.page().await?;
        page.goto(url)
            .await
            .map_err(|e| DashError::Connectivity {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn wait_for_network_idle(&self, quiet: Duration) -> DashResult<()> {
        loop {
            let idle = {
                let t = self.traffic.lock().unwrap_or_else(PoisonError::into_inner);
                t.in_flight.is_empty() && t.last_activity.elapsed() >= quiet
            };
            if idle {
                return Ok(());
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    async fn evaluate(&self, script: &PageScript) -> DashResult<Value> {
        let page = self.page().await?;
        let params = EvaluateParams::builder()
            .expression(script.to_js())
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(DashError::evaluation)?;
        let result = page
            .evaluate_expression(params)
            .await
            .map_err(|e| DashError::evaluation(format!("{}: {e}", script.label())))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn close(&mut self) -> DashResult<()> {
        for task in self.background.drain(..) {
            task.abort();
        }
        if let Some(page) = self.page.lock().await.take() {
            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "page already closed");
            }
        }
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await.map(|_| ()).map_err(launch_error);
        self.handler.abort();
        closed
    }
}
