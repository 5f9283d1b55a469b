//! Page probe.
//!
//! Every inspection runs inside the page's own execution context through
//! the session's driver, bounded by the configured probe timeout.

use crate::result::{DashError, DashResult};
use crate::script::{ChannelState, ElementState, FetchResult, InvokeResult, PageScript};
use crate::session::Session;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Outcome of calling a page function
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The call completed; JSON-coerced return value
    Returned(Value),
    /// The call threw; captured message
    Threw(String),
    /// The name is not callable on the page
    Missing,
}

impl Invocation {
    /// Convert to a result, mapping a throw and a missing function to errors
    pub fn into_result(self, function: &str) -> DashResult<Value> {
        match self {
            Self::Returned(value) => Ok(value),
            Self::Threw(message) => Err(DashError::Invocation {
                function: function.to_string(),
                message,
            }),
            Self::Missing => Err(DashError::FunctionMissing {
                name: function.to_string(),
            }),
        }
    }
}

impl From<InvokeResult> for Invocation {
    fn from(result: InvokeResult) -> Self {
        if result.missing {
            Self::Missing
        } else if result.ok {
            Self::Returned(result.value)
        } else {
            Self::Threw(result.error.unwrap_or_else(|| "unknown error".to_string()))
        }
    }
}

/// Handle for evaluating scripts against an open session
#[derive(Debug, Clone, Copy)]
pub struct PageProbe<'s> {
    session: &'s Session,
}

impl<'s> PageProbe<'s> {
    /// Create a probe over a session
    #[must_use]
    pub const fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// The underlying session
    #[must_use]
    pub const fn session(&self) -> &'s Session {
        self.session
    }

    /// Evaluate a script and decode its JSON result
    ///
    /// # Errors
    ///
    /// [`DashError::SessionClosed`] after teardown, [`DashError::Timeout`] when
    /// the page does not answer within the probe timeout, and
    /// [`DashError::Evaluation`] when the result has an unexpected shape.
    pub async fn evaluate<T: DeserializeOwned>(&self, script: &PageScript) -> DashResult<T> {
        let driver = self.session.driver()?;
        let limit = self.session.config().probe_timeout;
        let label = script.label();
        tracing::trace!(script = %label, "evaluate");

        let value = tokio::time::timeout(limit, driver.evaluate(script))
            .await
            .map_err(|_| DashError::timeout(label.clone(), limit.as_millis() as u64))??;

        serde_json::from_value(value)
            .map_err(|e| DashError::evaluation(format!("{label}: unexpected result: {e}")))
    }

    /// Existence and rendered content of an element
    pub async fn element(&self, id: &str) -> DashResult<ElementState> {
        self.evaluate(&PageScript::element(id)).await
    }

    /// Like [`Self::element`], but a missing element is an error
    pub async fn require_element(&self, id: &str) -> DashResult<ElementState> {
        let state = self.element(id).await?;
        if state.exists {
            Ok(state)
        } else {
            Err(DashError::ElementNotFound { id: id.to_string() })
        }
    }

    /// Whether a page global is callable
    pub async fn is_callable(&self, name: &str) -> DashResult<bool> {
        self.evaluate(&PageScript::callable(name)).await
    }

    /// Call a page function inside a failure-isolating wrapper
    pub async fn invoke(&self, function: &str, args: Vec<Value>) -> DashResult<Invocation> {
        let result: InvokeResult = self.evaluate(&PageScript::invoke(function, args)).await?;
        let invocation = Invocation::from(result);
        if let Invocation::Threw(message) = &invocation {
            tracing::debug!(function, %message, "page function threw");
        }
        Ok(invocation)
    }

    /// Length of a page-global array, `None` when absent
    pub async fn array_len(&self, global: &str) -> DashResult<Option<usize>> {
        self.evaluate(&PageScript::ArrayLength {
            global: global.to_string(),
        })
        .await
    }

    /// State of a live-update channel object
    pub async fn channel(&self, global: &str) -> DashResult<ChannelState> {
        self.evaluate(&PageScript::ChannelState {
            global: global.to_string(),
        })
        .await
    }

    /// Rendered body text
    pub async fn body_text(&self) -> DashResult<String> {
        self.evaluate(&PageScript::BodyText).await
    }

    /// `fetch()` a URL from inside the page
    pub async fn fetch(&self, url: &str) -> DashResult<FetchResult> {
        self.evaluate(&PageScript::Fetch {
            url: url.to_string(),
        })
        .await
    }
}
