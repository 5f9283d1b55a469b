//! Phase runner.
//!
//! Phases run strictly in declaration order and checks run one at a time.
//! Each check is an isolation boundary: non-fatal errors and panics become
//! `Fail`, unmet preconditions become `Skipped`, and later checks and phases
//! always run. Only a fatal error (closed session) stops the run.

use crate::api::ApiClient;
use crate::check::{CheckOutcome, CheckSpec, OutcomeTag, Phase, Probe, SyntheticInput};
use crate::config::RunConfig;
use crate::driver::PageDriver;
use crate::hooks::{EventKind, EventRecord};
use crate::ledger::{CheckRecord, Ledger, PhaseRecord};
use crate::phases::standard_phases;
use crate::probe::PageProbe;
use crate::result::{DashError, DashResult};
use crate::session::Session;
use crate::status::OverallStatus;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

/// A run stopped by a fatal error, with the checks completed before it
#[derive(Debug)]
pub struct Aborted {
    /// Outcomes recorded before the fatal error
    pub ledger: Ledger,
    /// The fatal error
    pub error: DashError,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Digits of a rendered counter, ignoring grouping separators
fn rendered_count(text: &str) -> Option<i64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '.' | '_' | ' ' | '\u{a0}' | '\''))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Executes phases against one open session
#[derive(Debug, Clone, Copy)]
pub struct PhaseRunner<'s> {
    session: &'s Session,
    probe: PageProbe<'s>,
    api: ApiClient<'s>,
}

impl<'s> PhaseRunner<'s> {
    /// Create a runner over a session
    #[must_use]
    pub const fn new(session: &'s Session) -> Self {
        let probe = PageProbe::new(session);
        Self {
            session,
            probe,
            api: ApiClient::new(probe),
        }
    }

    /// Run every phase in order
    ///
    /// # Errors
    ///
    /// Returns [`Aborted`] only when a check hits a fatal error.
    pub async fn run(&self, phases: &[Phase]) -> Result<Ledger, Aborted> {
        let mut ledger = Ledger::new();
        for phase in phases {
            match self.run_phase(phase, &ledger).await {
                Ok(record) => ledger = ledger.append(record),
                Err((record, error)) => {
                    tracing::error!(phase = %phase.name, %error, "run aborted");
                    return Err(Aborted {
                        ledger: ledger.append(record),
                        error,
                    });
                }
            }
        }
        Ok(ledger)
    }

    /// Run one phase; on a fatal error, returns the partial record with it
    pub async fn run_phase(
        &self,
        phase: &Phase,
        earlier: &Ledger,
    ) -> Result<PhaseRecord, (PhaseRecord, DashError)> {
        tracing::info!(phase = %phase.name, checks = phase.check_count(), "phase started");
        let mut record = PhaseRecord::for_phase(phase);

        for spec in &phase.checks {
            let started = Instant::now();
            let outcome = match Self::unmet_requirement(spec, &record, earlier) {
                Some(reason) => CheckOutcome::skipped(reason),
                None => match self.isolated(spec).await {
                    Ok(outcome) => outcome,
                    Err(error) => return Err((record, error)),
                },
            };
            let elapsed = started.elapsed().as_millis() as u64;

            match &outcome {
                CheckOutcome::Fail { reason } => tracing::warn!(check = %spec.id, %reason, "check failed"),
                other => tracing::debug!(check = %spec.id, outcome = other.tag().label(), "check finished"),
            }
            record.checks.push(CheckRecord::new(spec, outcome, elapsed));
        }

        tracing::info!(
            phase = %phase.name,
            failed = record.count(OutcomeTag::Fail),
            skipped = record.count(OutcomeTag::Skipped),
            "phase finished"
        );
        Ok(record)
    }

    fn unmet_requirement(spec: &CheckSpec, current: &PhaseRecord, earlier: &Ledger) -> Option<String> {
        spec.requires.iter().find_map(|req| {
            match current.outcome(req).or_else(|| earlier.outcome(req)) {
                Some(outcome) if outcome.is_pass() => None,
                Some(outcome) => Some(format!(
                    "requires {req} ({})",
                    outcome.tag().label().to_ascii_lowercase()
                )),
                None => Some(format!("requires {req} (not run)")),
            }
        })
    }

    /// Evaluate a check, converting non-fatal errors and panics to `Fail`
    async fn isolated(&self, spec: &CheckSpec) -> DashResult<CheckOutcome> {
        tracing::debug!(check = %spec.id, "check started");
        match AssertUnwindSafe(self.evaluate(&spec.probe)).catch_unwind().await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(error)) if error.is_fatal() => Err(error),
            Ok(Err(error)) => Ok(CheckOutcome::fail(error.to_string())),
            Err(panic) => Ok(CheckOutcome::fail(format!(
                "check panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    fn config(&self) -> &RunConfig {
        self.session.config()
    }

    async fn evaluate(&self, probe: &Probe) -> DashResult<CheckOutcome> {
        match probe {
            Probe::ElementPresent { id } => {
                self.probe.require_element(id).await?;
                Ok(CheckOutcome::pass(format!("#{id} present")))
            }
            Probe::ElementRendered { id, initialize } => self.element_rendered(id, initialize.as_deref()).await,
            Probe::OptionalElement { id } => {
                let state = self.probe.element(id).await?;
                Ok(if !state.exists {
                    CheckOutcome::skipped(format!("#{id} not present on this page"))
                } else if state.has_content() {
                    CheckOutcome::pass(format!("#{id} rendered ({} chars)", state.html_len))
                } else {
                    CheckOutcome::fail(format!("#{id} present but empty"))
                })
            }
            Probe::PopulatedText { id } => {
                let state = self.probe.require_element(id).await?;
                Ok(if self.config().is_placeholder(&state.text) {
                    CheckOutcome::fail(format!("#{id} shows placeholder {:?}", state.text))
                } else {
                    CheckOutcome::pass(format!("#{id} = {}", state.text))
                })
            }
            Probe::Callable { name } => {
                if self.probe.is_callable(name).await? {
                    Ok(CheckOutcome::pass(format!("{name}() is callable")))
                } else {
                    Err(DashError::FunctionMissing { name: name.clone() })
                }
            }
            Probe::MarkerIncrement { function, array } => self.marker_increment(function, array).await,
            Probe::AcceptsInput { function, input } => {
                let arg = self.synthetic(input)?;
                self.probe
                    .invoke(function, vec![arg])
                    .await?
                    .into_result(function)?;
                Ok(CheckOutcome::pass(format!(
                    "{function}({}) returned",
                    input.describe()
                )))
            }
            Probe::ChannelPresent { global } => {
                if self.probe.channel(global).await?.exists {
                    Ok(CheckOutcome::pass(format!("`{global}` exists")))
                } else {
                    Ok(CheckOutcome::fail(format!("channel object `{global}` is not defined")))
                }
            }
            Probe::ChannelConnected { global } => {
                let state = self.probe.channel(global).await?;
                let id = state.id.filter(|id| !id.is_empty());
                Ok(match (state.connected, id) {
                    (None, _) => CheckOutcome::skipped(format!(
                        "`{global}` does not expose a connection state"
                    )),
                    (Some(false), _) => CheckOutcome::fail(format!("`{global}` is disconnected")),
                    (Some(true), Some(id)) => CheckOutcome::pass(format!("connected as {id}")),
                    (Some(true), None) => {
                        CheckOutcome::fail(format!("`{global}` is connected without an identifier"))
                    }
                })
            }
            Probe::TextAbsent { text } => {
                if self.probe.body_text().await?.contains(text.as_str()) {
                    Ok(CheckOutcome::fail(format!("{text:?} is still rendered")))
                } else {
                    Ok(CheckOutcome::pass(format!("{text:?} not rendered")))
                }
            }
            Probe::StatsAvailable => {
                let stats = self.api.fetch_stats().await?;
                Ok(CheckOutcome::pass(format!(
                    "{} connections, {} recent attacks, {} alerts",
                    stats.total_connections,
                    stats.recent_attacks.len(),
                    stats.alerts.len()
                )))
            }
            Probe::StatsNonNegative => {
                let negative = self.api.fetch_stats().await?.negative_counts();
                Ok(if negative.is_empty() {
                    CheckOutcome::pass("all counters non-negative")
                } else {
                    CheckOutcome::fail(format!("negative counters: {}", negative.join(", ")))
                })
            }
            Probe::StatsGeolocation => {
                let stats = self.api.fetch_stats().await?;
                let (geo, total) = (stats.geolocated_count(), stats.recent_attacks.len());
                Ok(if geo <= total {
                    CheckOutcome::pass(format!("{geo}/{total} recent attacks geolocated"))
                } else {
                    CheckOutcome::fail(format!("{geo} geolocated of {total} recent attacks"))
                })
            }
            Probe::StatsSuccessRate => {
                let stats = self.api.fetch_stats().await?;
                Ok(match stats.success_rate {
                    None => CheckOutcome::skipped("success_rate not reported"),
                    Some(rate) if (0.0..=100.0).contains(&rate) => {
                        CheckOutcome::pass(format!("success_rate {rate:.2}%"))
                    }
                    Some(rate) => CheckOutcome::fail(format!("success_rate {rate} outside 0..=100")),
                })
            }
            Probe::StatsDomTotal { id } => {
                let state = self.probe.require_element(id).await?;
                let Some(shown) = rendered_count(&state.text) else {
                    return Ok(CheckOutcome::skipped(format!(
                        "#{id} shows non-numeric {:?}",
                        state.text
                    )));
                };
                let total = self.api.fetch_stats().await?.total_connections;
                Ok(if shown <= total {
                    CheckOutcome::pass(format!("#{id} {shown} <= api {total}"))
                } else {
                    CheckOutcome::fail(format!("#{id} shows {shown} but api reports {total}"))
                })
            }
            Probe::Health => {
                let health = self.api.fetch_health().await?;
                Ok(if health.is_healthy() {
                    CheckOutcome::pass(format!("status {}", health.status))
                } else {
                    CheckOutcome::fail(format!("status {:?}", health.status))
                })
            }
            Probe::NoPageErrors => {
                let events = self.session.events().snapshot();
                let errors: Vec<&EventRecord> = events
                    .iter()
                    .filter(|e| e.kind == EventKind::PageError)
                    .collect();
                Ok(match errors.first() {
                    None => CheckOutcome::pass(format!("no page errors in {} events", events.len())),
                    Some(first) => CheckOutcome::fail(format!(
                        "{} page error(s), first: {}",
                        errors.len(),
                        first.summary()
                    )),
                })
            }
        }
    }

    async fn element_rendered(&self, id: &str, initialize: Option<&str>) -> DashResult<CheckOutcome> {
        self.probe.require_element(id).await?;
        if let Some(init) = initialize {
            if self.probe.is_callable(init).await? {
                self.probe.invoke(init, Vec::new()).await?.into_result(init)?;
            }
        }
        let state = self.probe.require_element(id).await?;
        Ok(if state.has_content() {
            CheckOutcome::pass(format!("#{id} rendered ({} chars)", state.html_len))
        } else {
            CheckOutcome::fail(format!("#{id} is empty"))
        })
    }

    async fn marker_increment(&self, function: &str, array: &str) -> DashResult<CheckOutcome> {
        let before = self.probe.array_len(array).await?.unwrap_or(0);
        let record = self.config().synthetic_attack.record_at(Utc::now());
        self.probe
            .invoke(function, vec![serde_json::to_value(record)?])
            .await?
            .into_result(function)?;
        Ok(match self.probe.array_len(array).await? {
            None => CheckOutcome::fail(format!("{array} is not defined")),
            Some(after) if after > before => {
                CheckOutcome::pass(format!("{array} {before} -> {after}"))
            }
            Some(after) => CheckOutcome::fail(format!("{array} did not grow ({before} -> {after})")),
        })
    }

    fn synthetic(&self, input: &SyntheticInput) -> DashResult<Value> {
        Ok(match input {
            SyntheticInput::Null => Value::Null,
            SyntheticInput::EmptyRecord => json!({}),
            SyntheticInput::Timeline { count } => serde_json::to_value(
                self.config()
                    .synthetic_attack
                    .timeline_ending_at(Utc::now(), *count),
            )?,
        })
    }
}

/// Everything a completed run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Dashboard URL
    pub target: String,
    /// When the run started
    pub started: DateTime<Utc>,
    /// When the session closed
    pub finished: DateTime<Utc>,
    /// One outcome per declared check
    pub ledger: Ledger,
    /// Verdict derived from the ledger
    pub status: OverallStatus,
    /// Captured page events in arrival order
    pub events: Vec<EventRecord>,
    /// Error from closing the browser after every check ran; does not affect
    /// the verdict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown: Option<String>,
}

/// A run that could not complete
#[derive(Debug, Error)]
#[error("run {run_id} against {target} aborted: {error}")]
pub struct FatalRun {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Dashboard URL
    pub target: String,
    /// When the run started
    pub started: DateTime<Utc>,
    /// When the run was abandoned
    pub finished: DateTime<Utc>,
    /// Outcomes recorded before the abort (empty when the session never opened)
    pub ledger: Ledger,
    /// The fatal error
    #[source]
    pub error: DashError,
}

impl FatalRun {
    /// A run that failed before any session opened
    #[must_use]
    pub fn unopened(target: impl Into<String>, error: DashError) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            target: target.into(),
            started: now,
            finished: now,
            ledger: Ledger::new(),
            error,
        }
    }
}

/// One verification pass: open a session, run the phases, close the session
#[derive(Debug, Clone)]
pub struct Verification {
    config: RunConfig,
    phases: Vec<Phase>,
}

impl Verification {
    /// A pass over the standard phases
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        let phases = standard_phases(&config);
        Self { config, phases }
    }

    /// Replace the phase list
    #[must_use]
    pub fn with_phases(mut self, phases: Vec<Phase>) -> Self {
        self.phases = phases;
        self
    }

    /// Phases this pass will run
    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Run configuration
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute the pass on a fresh driver
    ///
    /// # Errors
    ///
    /// Returns [`FatalRun`] when the session cannot be opened or a check hits
    /// a fatal error. A failure to close the session after the phases ran is
    /// kept in [`RunReport::teardown`] instead.
    pub async fn execute(&self, driver: Box<dyn PageDriver>) -> Result<RunReport, FatalRun> {
        let run_id = Uuid::new_v4();
        let started = Utc::now();
        tracing::info!(%run_id, target = %self.config.target, phases = self.phases.len(), "run started");

        let phases = self.phases.clone();
        let scoped = Session::scoped(driver, &self.config, move |session| {
            async move { PhaseRunner::new(session).run(&phases).await }.boxed()
        })
        .await;

        let fatal = |ledger: Ledger, error: DashError| FatalRun {
            run_id,
            target: self.config.target.clone(),
            started,
            finished: Utc::now(),
            ledger,
            error,
        };

        let scoped = match scoped {
            Err(error) => return Err(fatal(Ledger::new(), error)),
            Ok(scoped) => scoped,
        };
        match scoped.value {
            Err(aborted) => Err(fatal(aborted.ledger, aborted.error)),
            Ok(ledger) => {
                let status = OverallStatus::evaluate(&ledger);
                tracing::info!(
                    %run_id,
                    verdict = %status.verdict(),
                    failing = status.failing().len(),
                    "run finished"
                );
                Ok(RunReport {
                    run_id,
                    target: self.config.target.clone(),
                    started,
                    finished: Utc::now(),
                    ledger,
                    status,
                    events: scoped.events,
                    teardown: scoped.teardown.map(|e| e.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockPage};
    use crate::script::ChannelState;
    use std::time::Duration;

    fn config() -> RunConfig {
        RunConfig::default()
            .with_settle_delay(Duration::ZERO)
            .with_probe_timeout(Duration::from_millis(200))
    }

    async fn run(page: MockPage) -> RunReport {
        Verification::new(config())
            .execute(Box::new(MockDriver::new(page)))
            .await
            .unwrap()
    }

    mod helper_tests {
        use super::*;

        #[test]
        fn test_rendered_count() {
            assert_eq!(rendered_count("1,204"), Some(1204));
            assert_eq!(rendered_count(" 980 "), Some(980));
            assert_eq!(rendered_count("1 204"), Some(1204));
            assert_eq!(rendered_count("Loading..."), None);
            assert_eq!(rendered_count(""), None);
            assert_eq!(rendered_count("-5"), None);
        }

        #[test]
        fn test_panic_message() {
            let payload: Box<dyn Any + Send> = Box::new("static");
            assert_eq!(panic_message(payload.as_ref()), "static");
            let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
            assert_eq!(panic_message(payload.as_ref()), "owned");
            let payload: Box<dyn Any + Send> = Box::new(7_u8);
            assert_eq!(panic_message(payload.as_ref()), "unknown panic");
        }
    }

    mod isolation_tests {
        use super::*;

        #[tokio::test]
        async fn test_precondition_failure_skips_dependents() {
            let report = run(MockPage::compliant().without_function("updateTopUsers")).await;
            let ledger = &report.ledger;
            assert!(ledger.outcome("top_lists.users.update_exposed").unwrap().is_fail());
            let null = ledger.outcome("top_lists.users.null_input").unwrap();
            assert!(null.is_skipped());
            assert!(null.message().contains("top_lists.users.update_exposed"));
            assert!(ledger.outcome("top_lists.users.empty_input").unwrap().is_skipped());
            assert!(ledger.outcome("export.fn.exportLogs").unwrap().is_pass());
        }

        #[tokio::test]
        async fn test_panicking_check_is_recorded_as_fail() {
            let page = MockPage::compliant()
                .with_function("updateTopUsers", |_, _| panic!("renderer exploded"));
            let report = run(page).await;
            let outcome = report.ledger.outcome("top_lists.users.null_input").unwrap();
            assert_eq!(outcome.message(), "check panicked: renderer exploded");
            assert!(report.ledger.outcome("api.fetch_stats").unwrap().is_pass());
            assert!(!report.status.is_pass());
        }

        #[tokio::test]
        async fn test_probe_timeout_fails_only_that_check() {
            let page = MockPage::compliant().with_slow_script("body text", Duration::from_secs(5));
            let report = run(page).await;
            let outcome = report.ledger.outcome("export.statistics_removed").unwrap();
            assert!(outcome.is_fail());
            assert!(outcome.message().contains("timed out"));
            assert!(report.ledger.outcome("statistics.total_connections").unwrap().is_pass());
        }

        #[tokio::test]
        async fn test_every_declared_check_is_recorded_once() {
            let page = MockPage::compliant()
                .without_element("timeline-chart")
                .without_function("initializeMaps")
                .with_response("/api/health", 503, "down");
            let verification = Verification::new(config());
            let report = verification
                .execute(Box::new(MockDriver::new(page)))
                .await
                .unwrap();
            assert!(report.ledger.covers(verification.phases()));
        }
    }

    mod probe_semantics_tests {
        use super::*;

        #[tokio::test]
        async fn test_channel_without_state_is_skipped() {
            let page = MockPage::compliant().with_channel(
                "socket",
                ChannelState {
                    exists: true,
                    connected: None,
                    id: None,
                },
            );
            let report = run(page).await;
            assert!(report.ledger.outcome("live_channel.connected").unwrap().is_skipped());
            assert!(report.status.is_pass());
        }

        #[tokio::test]
        async fn test_missing_channel_skips_connection_check() {
            let page = MockPage::compliant().with_channel("socket", ChannelState::default());
            let report = run(page).await;
            assert!(report.ledger.outcome("live_channel.object").unwrap().is_fail());
            assert!(report.ledger.outcome("live_channel.connected").unwrap().is_skipped());
        }

        #[tokio::test]
        async fn test_placeholder_card_fails() {
            let page = MockPage::compliant().with_element(
                "failed-logins",
                crate::script::ElementState::rendered(10, "Loading..."),
            );
            let report = run(page).await;
            let outcome = report.ledger.outcome("statistics.failed_logins").unwrap();
            assert!(outcome.is_fail());
            assert!(outcome.message().contains("placeholder"));
        }

        #[tokio::test]
        async fn test_removed_export_label_fails() {
            let mut page = MockPage::compliant();
            page.body_text.push_str("\nExport Statistics");
            let report = run(page).await;
            assert!(report.ledger.outcome("export.statistics_removed").unwrap().is_fail());
        }

        #[tokio::test]
        async fn test_dom_total_above_api_fails() {
            let page = MockPage::compliant().with_element(
                "total-connections",
                crate::script::ElementState::rendered(5, "9,999"),
            );
            let report = run(page).await;
            assert!(report.ledger.outcome("api.dom_total_consistent").unwrap().is_fail());
        }

        #[tokio::test]
        async fn test_missing_secondary_map_is_skipped() {
            let report = run(MockPage::compliant().without_element("large-world-map")).await;
            assert!(report
                .ledger
                .outcome("world_map.secondary_container")
                .unwrap()
                .is_skipped());
            assert!(report.status.is_pass());
        }

        #[tokio::test]
        async fn test_synthetic_attack_coordinates_reach_page() {
            let page = MockPage::compliant().with_function("addAttackMarker", |args, p| {
                let attack = &args[0];
                if attack["latitude"] != -33.87 || attack["country"] != "Australia" {
                    return Err(format!("unexpected attack {attack}"));
                }
                *p.arrays.entry("attackMarkers".into()).or_insert(0) += 1;
                Ok(Value::Null)
            });
            let attack = crate::contract::SyntheticAttack {
                latitude: -33.87,
                longitude: 151.21,
                country: "Australia".into(),
                ..crate::contract::SyntheticAttack::default()
            };
            let report = Verification::new(config().with_synthetic_attack(attack))
                .execute(Box::new(MockDriver::new(page)))
                .await
                .unwrap();
            let outcome = report.ledger.outcome("world_map.marker_increment").unwrap();
            assert!(outcome.is_pass(), "{}", outcome.message());
        }

        #[tokio::test]
        async fn test_empty_secondary_map_fails() {
            let page = MockPage::compliant().with_element(
                "large-world-map",
                crate::script::ElementState::rendered(0, ""),
            );
            let report = run(page).await;
            let outcome = report.ledger.outcome("world_map.secondary_container").unwrap();
            assert!(outcome.is_fail());
            assert_eq!(outcome.message(), "#large-world-map present but empty");
        }

        #[tokio::test]
        async fn test_connected_channel_without_id_fails() {
            let page = MockPage::compliant().with_channel(
                "socket",
                ChannelState {
                    exists: true,
                    connected: Some(true),
                    id: Some(String::new()),
                },
            );
            let report = run(page).await;
            let outcome = report.ledger.outcome("live_channel.connected").unwrap();
            assert!(outcome.is_fail());
            assert!(outcome.message().contains("without an identifier"));
        }

        #[tokio::test]
        async fn test_success_rate_out_of_range_fails() {
            let body = r#"{"total_connections":1204,"failed_logins":2,"successful_logins":8,"success_rate":180.0,"recent_attacks":[],"alerts":[]}"#;
            let page = MockPage::compliant().with_response("/api/stats", 200, body);
            let report = run(page).await;
            let outcome = report.ledger.outcome("api.success_rate_bounds").unwrap();
            assert!(outcome.is_fail());
            assert_eq!(outcome.message(), "success_rate 180 outside 0..=100");
            assert!(report.ledger.outcome("api.fetch_stats").unwrap().is_pass());
        }

        #[tokio::test]
        async fn test_success_rate_bounds_are_inclusive() {
            let body = r#"{"total_connections":1204,"failed_logins":0,"successful_logins":10,"success_rate":100.0,"recent_attacks":[],"alerts":[]}"#;
            let page = MockPage::compliant().with_response("/api/stats", 200, body);
            let report = run(page).await;
            assert!(report.ledger.outcome("api.success_rate_bounds").unwrap().is_pass());
        }

        #[tokio::test]
        async fn test_page_errors_fail_instrumentation_phase() {
            let page = MockPage::compliant()
                .with_startup_event(EventKind::PageError, r#"{"message":"Uncaught ReferenceError: L is not defined"}"#);
            let report = run(page).await;
            let outcome = report.ledger.outcome("instrumentation.no_page_errors").unwrap();
            assert!(outcome.is_fail());
            assert!(outcome.message().contains("L is not defined"));
            assert_eq!(report.events[0].kind, EventKind::PageError);
        }
    }

    mod fatal_tests {
        use super::*;
        use crate::mock::Navigation;

        #[tokio::test]
        async fn test_connectivity_failure_yields_empty_ledger() {
            let driver = MockDriver::new(MockPage::compliant().with_navigation(Navigation::Hang));
            let observer = driver.clone();
            let fatal = Verification::new(config().with_navigation_timeout(Duration::from_millis(50)))
                .execute(Box::new(driver))
                .await
                .unwrap_err();
            assert!(matches!(fatal.error, DashError::Connectivity { .. }));
            assert!(fatal.ledger.is_empty());
            assert!(observer.is_closed());
            assert!(!observer.was_called("invoke:"));
        }
    }

    mod teardown_tests {
        use super::*;
        use crate::mock::Teardown;

        #[tokio::test]
        async fn test_failed_close_keeps_complete_report() {
            let page = MockPage::compliant()
                .with_teardown(Teardown::Fail("Browser.close: connection reset".into()));
            let verification = Verification::new(config());
            let report = verification
                .execute(Box::new(MockDriver::new(page)))
                .await
                .unwrap();
            assert_eq!(report.ledger.len(), 50);
            assert!(report.ledger.covers(verification.phases()));
            assert!(report.status.is_pass());
            assert!(report
                .teardown
                .as_deref()
                .unwrap()
                .contains("connection reset"));
            assert!(!report.events.is_empty());
        }

        #[tokio::test]
        async fn test_hanging_close_is_bounded() {
            let driver = MockDriver::new(MockPage::compliant().with_teardown(Teardown::Hang));
            let observer = driver.clone();
            let report = Verification::new(config())
                .execute(Box::new(driver))
                .await
                .unwrap();
            assert!(observer.is_closed());
            assert!(report.teardown.unwrap().contains("timed out"));
            assert_eq!(report.ledger.len(), 50);
        }

        #[tokio::test]
        async fn test_clean_close_has_no_teardown_error() {
            let report = run(MockPage::compliant()).await;
            assert!(report.teardown.is_none());
            let json = serde_json::to_value(&report).unwrap();
            assert!(json.get("teardown").is_none());
        }
    }
}
