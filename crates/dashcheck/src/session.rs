//! Session launcher.
//!
//! One session is one browser page against the target origin, with the
//! request policy installed and instrumentation attached before the first
//! navigation. Establishment is bounded by the navigation timeout; any failure
//! there is a [`DashError::Connectivity`] and closes the driver.

use crate::config::{Credentials, RunConfig};
use crate::driver::{PageDriver, RequestPolicy};
use crate::hooks::{EventRecord, EventSink, Instrumentation};
use crate::result::{DashError, DashResult};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// What a scoped session produced
#[derive(Debug)]
pub struct Scoped<T> {
    /// The body's value
    pub value: T,
    /// Every event captured while the session was open
    pub events: Vec<EventRecord>,
    /// Set when closing the driver failed after the body finished
    pub teardown: Option<DashError>,
}

/// An open, instrumented page on the target dashboard
pub struct Session {
    driver: Box<dyn PageDriver>,
    instrumentation: Instrumentation,
    config: RunConfig,
    opened_at: DateTime<Utc>,
    open: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.config.target)
            .field("opened_at", &self.opened_at)
            .field("open", &self.open)
            .field("events", &self.instrumentation.sink().len())
            .finish()
    }
}

fn connectivity(url: &str, err: DashError) -> DashError {
    match err {
        DashError::Connectivity { .. } | DashError::BrowserLaunch { .. } => err,
        other => DashError::Connectivity {
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}

impl Session {
    /// Establish a session: install the request policy, attach
    /// instrumentation, navigate, wait for network idle, then settle.
    ///
    /// # Errors
    ///
    /// Returns [`DashError::Connectivity`] if any step fails or the whole
    /// establishment exceeds `config.navigation_timeout`.
    pub async fn open(mut driver: Box<dyn PageDriver>, config: &RunConfig) -> DashResult<Self> {
        let url = config.target.clone();
        let policy = RequestPolicy {
            authorization: config
                .credentials
                .as_ref()
                .map(Credentials::authorization_header),
            ..RequestPolicy::default()
        };
        tracing::info!(target_url = %url, authenticated = policy.authorization.is_some(), "opening session");

        let establish = async {
            driver.prepare(&policy).await?;
            let instrumentation =
                Instrumentation::attach(driver.as_mut(), config.interesting_endpoints.clone())
                    .await?;
            driver.navigate(&url).await?;
            driver.wait_for_network_idle(config.idle_threshold).await?;
            Ok::<_, DashError>(instrumentation)
        };
        let outcome = tokio::time::timeout(config.navigation_timeout, establish).await;

        let instrumentation = match outcome {
            Ok(Ok(instrumentation)) => instrumentation,
            Ok(Err(err)) => {
                let _ = driver.close().await;
                return Err(connectivity(&url, err));
            }
            Err(_) => {
                let _ = driver.close().await;
                return Err(DashError::Connectivity {
                    url,
                    message: format!(
                        "navigation did not reach network idle within {}ms",
                        config.navigation_timeout.as_millis()
                    ),
                });
            }
        };

        if !config.settle_delay.is_zero() {
            tracing::debug!(delay = ?config.settle_delay, "settling");
            tokio::time::sleep(config.settle_delay).await;
        }

        tracing::info!(target_url = %url, "session open");
        Ok(Self {
            driver,
            instrumentation,
            config: config.clone(),
            opened_at: Utc::now(),
            open: true,
        })
    }

    /// Open a session, run `body` against it, and close it on every exit
    /// path, including a panic inside `body` (which is resumed after close).
    ///
    /// A failed close does not discard the body's value; it is reported in
    /// [`Scoped::teardown`].
    ///
    /// # Errors
    ///
    /// Returns [`DashError::Connectivity`] if the session cannot be opened.
    pub async fn scoped<T, F>(
        driver: Box<dyn PageDriver>,
        config: &RunConfig,
        body: F,
    ) -> DashResult<Scoped<T>>
    where
        F: for<'s> FnOnce(&'s Session) -> BoxFuture<'s, T>,
    {
        let mut session = Self::open(driver, config).await?;
        let result = AssertUnwindSafe(body(&session)).catch_unwind().await;
        let teardown = session.close().await.err();
        if let Some(err) = &teardown {
            tracing::warn!(error = %err, "session teardown failed");
        }
        match result {
            Ok(value) => Ok(Scoped {
                value,
                events: session.events().snapshot(),
                teardown,
            }),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// The driver, if the session is still open
    ///
    /// # Errors
    ///
    /// Returns [`DashError::SessionClosed`] after teardown.
    pub fn driver(&self) -> DashResult<&dyn PageDriver> {
        if self.open {
            Ok(self.driver.as_ref())
        } else {
            Err(DashError::SessionClosed)
        }
    }

    /// Run configuration the session was opened with
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Live event stream
    #[must_use]
    pub const fn events(&self) -> &EventSink {
        self.instrumentation.sink()
    }

    /// Whether the session is still open
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Tear down: stop listeners and close the page. Idempotent.
    ///
    /// Returns every event captured during the session. Closing the driver is
    /// bounded by the probe timeout.
    ///
    /// # Errors
    ///
    /// Returns the driver's close error, or [`DashError::Timeout`].
    pub async fn close(&mut self) -> DashResult<Vec<EventRecord>> {
        if self.open {
            self.open = false;
            self.instrumentation.detach();
            let events = self.instrumentation.sink().snapshot();
            tracing::info!(events = events.len(), "closing session");
            let limit = self.config.probe_timeout;
            tokio::time::timeout(limit, self.driver.close())
                .await
                .map_err(|_| DashError::timeout("close", limit.as_millis() as u64))??;
            return Ok(events);
        }
        Ok(self.instrumentation.sink().snapshot())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.open {
            tracing::warn!(target_url = %self.config.target, "session dropped without close");
        }
    }
}
