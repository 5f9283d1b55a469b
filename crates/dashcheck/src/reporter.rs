//! Reporter.
//!
//! Renders a run as phase-grouped text or as JSON. The body of the text
//! report depends only on the ledger, status and events, so two runs with
//! the same outcomes render identically apart from the header.

use crate::hooks::{EventKind, EventRecord};
use crate::ledger::Ledger;
use crate::result::DashResult;
use crate::runner::{FatalRun, RunReport};
use crate::status::OverallStatus;
use serde_json::json;
use std::fmt::Write as _;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable, phase-grouped text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Report renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    format: ReportFormat,
    list_events: bool,
}

impl Reporter {
    /// Create a reporter for a format
    #[must_use]
    pub const fn new(format: ReportFormat) -> Self {
        Self {
            format,
            list_events: false,
        }
    }

    /// List every captured event in text reports, not just the tally
    #[must_use]
    pub const fn with_events(mut self, list: bool) -> Self {
        self.list_events = list;
        self
    }

    /// Render a completed run
    pub fn render(&self, report: &RunReport) -> DashResult<String> {
        match self.format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            ReportFormat::Text => {
                let mut out = format!(
                    "dashcheck run {} against {}\nstarted {} finished {}\n\n",
                    report.run_id,
                    report.target,
                    report.started.to_rfc3339(),
                    report.finished.to_rfc3339()
                );
                out.push_str(&self.render_ledger(&report.ledger, &report.status, &report.events));
                if let Some(teardown) = &report.teardown {
                    let _ = writeln!(out, "warning: session teardown failed: {teardown}");
                }
                Ok(out)
            }
        }
    }

    /// Render a run that aborted: a single fatal entry instead of a phase report
    pub fn render_fatal(&self, fatal: &FatalRun) -> DashResult<String> {
        match self.format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "run_id": fatal.run_id,
                "target": fatal.target,
                "started": fatal.started,
                "finished": fatal.finished,
                "fatal": fatal.error.to_string(),
                "ledger": fatal.ledger,
            }))?),
            ReportFormat::Text => Ok(format!(
                "dashcheck run {} against {}\nFATAL: {}\nRESULT: FATAL ({} checks recorded before abort)\n",
                fatal.run_id,
                fatal.target,
                fatal.error,
                fatal.ledger.len()
            )),
        }
    }

    /// Phase-grouped body and summary
    #[must_use]
    pub fn render_ledger(
        &self,
        ledger: &Ledger,
        status: &OverallStatus,
        events: &[EventRecord],
    ) -> String {
        let mut out = String::new();
        for phase in ledger.phases() {
            let _ = writeln!(out, "== {} ==", phase.name);
            for check in &phase.checks {
                let _ = writeln!(
                    out,
                    "  [{}] {}  {}",
                    check.outcome.tag().label(),
                    check.id,
                    check.outcome.message()
                );
            }
            out.push('\n');
        }

        let tally = [
            EventKind::Console,
            EventKind::PageError,
            EventKind::Request,
            EventKind::Response,
        ]
        .iter()
        .map(|kind| {
            let n = events.iter().filter(|e| e.kind == *kind).count();
            format!("{n} {kind}")
        })
        .collect::<Vec<_>>()
        .join(", ");
        let _ = writeln!(out, "events: {tally}");
        if self.list_events {
            for event in events {
                let _ = writeln!(out, "  #{} {} {}", event.seq, event.kind, event.summary());
            }
        }

        let _ = writeln!(
            out,
            "RESULT: {} ({} passed, {} failed, {} skipped of {})",
            status.verdict(),
            status.passed(),
            status.failing().len(),
            status.skipped().len(),
            status.total()
        );
        if !status.failing().is_empty() {
            let _ = writeln!(out, "failing: {}", status.failing().join(", "));
        }
        if !status.skipped().is_empty() {
            let _ = writeln!(out, "skipped: {}", status.skipped().join(", "));
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::check::{CheckOutcome, CheckSpec, Phase, Probe};
    use crate::hooks::EventSink;
    use crate::ledger::{CheckRecord, PhaseRecord};
    use crate::result::DashError;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample() -> (Ledger, OverallStatus, Vec<EventRecord>) {
        let phase = Phase::new("api", "API Cross-Check")
            .with_check(CheckSpec::new("api.fetch_stats", "stats", Probe::StatsAvailable))
            .with_check(CheckSpec::new("api.health", "health", Probe::Health))
            .with_check(CheckSpec::new("api.success_rate_bounds", "rate", Probe::StatsSuccessRate));
        let mut record = PhaseRecord::for_phase(&phase);
        let outcomes = [
            CheckOutcome::fail("API error (status 500): boom"),
            CheckOutcome::pass("status healthy"),
            CheckOutcome::skipped("success_rate not reported"),
        ];
        for (spec, outcome) in phase.checks.iter().zip(outcomes) {
            record.checks.push(CheckRecord::new(spec, outcome, 3));
        }
        let ledger = Ledger::new().append(record);
        let status = OverallStatus::evaluate(&ledger);

        let sink = EventSink::default();
        sink.record(EventKind::Console, json!({ "text": "socket connected" }));
        sink.record(EventKind::Response, json!({ "url": "/api/stats", "status": 500 }));
        (ledger, status, sink.snapshot())
    }

    #[test]
    fn test_text_is_grouped_by_phase() {
        let (ledger, status, events) = sample();
        let text = Reporter::default().render_ledger(&ledger, &status, &events);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "== API Cross-Check ==");
        assert_eq!(lines[1], "  [FAIL] api.fetch_stats  API error (status 500): boom");
        assert_eq!(lines[2], "  [PASS] api.health  status healthy");
        assert_eq!(lines[3], "  [SKIP] api.success_rate_bounds  success_rate not reported");
        assert!(text.contains("events: 1 console, 0 pageError, 0 request, 1 response"));
        assert!(text.contains("RESULT: FAIL (1 passed, 1 failed, 1 skipped of 3)"));
        assert!(text.contains("failing: api.fetch_stats"));
        assert!(text.contains("skipped: api.success_rate_bounds"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let (ledger, status, events) = sample();
        let reporter = Reporter::default().with_events(true);
        assert_eq!(
            reporter.render_ledger(&ledger, &status, &events),
            reporter.render_ledger(&ledger.clone(), &status.clone(), &events)
        );
        assert!(reporter
            .render_ledger(&ledger, &status, &events)
            .contains("#1 response 500 /api/stats"));
    }

    #[test]
    fn test_fatal_is_a_single_entry() {
        let fatal = FatalRun {
            run_id: Uuid::nil(),
            target: "http://localhost:3333".into(),
            started: Utc::now(),
            finished: Utc::now(),
            ledger: Ledger::new(),
            error: DashError::Connectivity {
                url: "http://localhost:3333".into(),
                message: "navigation did not reach network idle within 30000ms".into(),
            },
        };
        let text = Reporter::default().render_fatal(&fatal).unwrap();
        assert!(text.contains("FATAL: Could not connect to http://localhost:3333"));
        assert!(!text.contains("=="));

        let json: serde_json::Value =
            serde_json::from_str(&Reporter::new(ReportFormat::Json).render_fatal(&fatal).unwrap())
                .unwrap();
        assert_eq!(json["ledger"], json!([]));
        assert!(json["fatal"].as_str().unwrap().contains("Could not connect"));
    }

    #[test]
    fn test_launch_failure_renders_fatal_json() {
        let fatal = FatalRun::unopened(
            "http://localhost:3333",
            DashError::BrowserLaunch {
                message: "No such file or directory (os error 2)".into(),
            },
        );
        assert!(fatal.ledger.is_empty());
        let json: serde_json::Value =
            serde_json::from_str(&Reporter::new(ReportFormat::Json).render_fatal(&fatal).unwrap())
                .unwrap();
        assert_eq!(json["target"], "http://localhost:3333");
        assert!(json["fatal"].as_str().unwrap().starts_with("Failed to launch browser"));
    }
}
