//! End-to-end scenarios over the mock dashboard.
//!
//! Each scenario runs the full standard catalogue through `Verification`
//! against a scripted page and inspects the ledger, status and report.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use dashcheck::mock::{MockDriver, MockPage, Navigation, Teardown};
use dashcheck::prelude::*;
use dashcheck::{ChannelState, Credentials, EventKind, FatalRun};
use std::time::Duration;

fn config() -> RunConfig {
    RunConfig::new("http://localhost:3333").with_settle_delay(Duration::ZERO)
}

async fn run(page: MockPage) -> RunReport {
    Verification::new(config())
        .execute(Box::new(MockDriver::new(page)))
        .await
        .expect("run should complete")
}

async fn run_fatal(page: MockPage, config: RunConfig) -> (FatalRun, MockDriver) {
    let driver = MockDriver::new(page);
    let observer = driver.clone();
    let fatal = Verification::new(config)
        .execute(Box::new(driver))
        .await
        .expect_err("run should abort");
    (fatal, observer)
}

fn outcome<'a>(report: &'a RunReport, id: &str) -> &'a CheckOutcome {
    report
        .ledger
        .outcome(id)
        .unwrap_or_else(|| panic!("{id} missing from ledger"))
}

// ============================================================================
// Compliant dashboard
// ============================================================================

#[tokio::test]
async fn compliant_dashboard_passes_every_check() {
    let report = run(MockPage::compliant()).await;

    assert_eq!(report.status.verdict(), Verdict::Pass, "{:?}", report.status.failing());
    assert_eq!(report.status.total(), 50);
    assert!(report.status.skipped().is_empty());
    assert!(report
        .ledger
        .covers(&dashcheck::phases::standard_phases(&config())));
    assert_eq!(
        outcome(&report, "world_map.marker_increment").message(),
        "attackMarkers 0 -> 1"
    );
}

#[tokio::test]
async fn marker_side_effect_is_captured_as_console_event() {
    let report = run(MockPage::compliant()).await;
    assert!(report
        .events
        .iter()
        .any(|e| e.kind == EventKind::Console && e.summary().contains("marker added")));
}

#[tokio::test]
async fn outcomes_are_deterministic_across_runs() {
    let page = || {
        MockPage::compliant()
            .without_element("large-world-map")
            .with_response("/api/stats", 500, "Internal Server Error")
    };
    let first = run(page()).await;
    let second = run(page()).await;

    let tags = |r: &RunReport| {
        r.ledger
            .records()
            .map(|c| (c.id.clone(), c.outcome.tag()))
            .collect::<Vec<_>>()
    };
    assert_eq!(tags(&first), tags(&second));
    assert_ne!(first.run_id, second.run_id);

    let reporter = Reporter::default();
    assert_eq!(
        reporter.render_ledger(&first.ledger, &first.status, &[]),
        reporter.render_ledger(&second.ledger, &second.status, &[])
    );
}

// ============================================================================
// Broken features stay contained
// ============================================================================

#[tokio::test]
async fn missing_world_map_fails_only_its_own_check() {
    let page = MockPage::compliant()
        .without_element("world-map")
        .without_function("initializeMaps");
    let report = run(page).await;

    assert!(outcome(&report, "world_map.container").is_fail());
    assert_eq!(
        outcome(&report, "world_map.container").message(),
        "Element #world-map not found"
    );
    assert!(outcome(&report, "world_map.fn.initializeMaps").is_fail());
    assert!(outcome(&report, "world_map.marker_increment").is_pass());
    for phase in ["timeline", "live_channel", "top_lists", "export", "statistics", "api"] {
        let record = report
            .ledger
            .phases()
            .iter()
            .find(|p| p.key == phase)
            .unwrap();
        assert_eq!(record.count(OutcomeTag::Fail), 0, "{phase}");
    }
    assert_eq!(report.status.total(), 50);
}

#[tokio::test]
async fn throwing_top_list_update_is_reported_and_later_phases_run() {
    let page = MockPage::compliant().with_function("updateTopCountries", |args, _| {
        match args.first() {
            Some(serde_json::Value::Null) | None => {
                Err("Cannot read properties of null (reading 'map')".into())
            }
            Some(_) => Ok(serde_json::Value::Null),
        }
    });
    let report = run(page).await;

    let null_input = outcome(&report, "top_lists.countries.null_input");
    assert!(null_input.is_fail());
    assert_eq!(
        null_input.message(),
        "updateTopCountries() threw: Cannot read properties of null (reading 'map')"
    );
    assert!(outcome(&report, "top_lists.countries.empty_input").is_pass());
    assert!(outcome(&report, "top_lists.passwords.null_input").is_pass());
    assert!(outcome(&report, "export.fn.exportCredentials").is_pass());
    assert_eq!(report.status.failing(), ["top_lists.countries.null_input"]);
}

#[tokio::test]
async fn missing_update_function_skips_its_dependents() {
    let report = run(MockPage::compliant().without_function("updateTopUsers")).await;

    assert!(outcome(&report, "top_lists.users.update_exposed").is_fail());
    for id in ["top_lists.users.null_input", "top_lists.users.empty_input"] {
        let skipped = outcome(&report, id);
        assert!(skipped.is_skipped(), "{id}");
        assert_eq!(
            skipped.message(),
            "requires top_lists.users.update_exposed (fail)"
        );
    }
    assert_eq!(report.status.verdict(), Verdict::Fail);
    assert_eq!(report.status.skipped().len(), 2);
}

#[tokio::test]
async fn backend_error_fails_api_checks_only() {
    let page = MockPage::compliant().with_response("/api/stats", 500, "Internal Server Error");
    let report = run(page).await;

    for id in [
        "api.fetch_stats",
        "api.non_negative_counts",
        "api.geolocation_consistent",
        "api.success_rate_bounds",
        "api.dom_total_consistent",
    ] {
        let failed = outcome(&report, id);
        assert!(failed.is_fail(), "{id}");
        assert_eq!(failed.message(), "API error (status 500): Internal Server Error");
    }
    assert!(outcome(&report, "api.health").is_pass());
    assert!(outcome(&report, "world_map.container").is_pass());
    assert!(outcome(&report, "timeline.accepts_events").is_pass());
}

#[tokio::test]
async fn disconnected_channel_fails_connection_check() {
    let page = MockPage::compliant().with_channel(
        "socket",
        ChannelState {
            exists: true,
            connected: Some(false),
            id: None,
        },
    );
    let report = run(page).await;
    assert!(outcome(&report, "live_channel.object").is_pass());
    assert_eq!(
        outcome(&report, "live_channel.connected").message(),
        "`socket` is disconnected"
    );
}

#[tokio::test]
async fn reintroduced_statistics_export_is_flagged() {
    let mut page = MockPage::compliant();
    page.body_text.push_str("\nExport Statistics");
    let report = run(page).await;
    assert!(outcome(&report, "export.statistics_removed").is_fail());
    assert!(outcome(&report, "export.fn.exportLogs").is_pass());
}

#[tokio::test]
async fn uncaught_page_error_fails_instrumentation() {
    let page = MockPage::compliant().with_startup_event(
        EventKind::PageError,
        r#"{"message":"TypeError: socket.on is not a function"}"#,
    );
    let report = run(page).await;
    let errors = outcome(&report, "instrumentation.no_page_errors");
    assert!(errors.is_fail());
    assert!(errors.message().contains("socket.on is not a function"));
    assert_eq!(report.status.failing().to_vec(), vec!["instrumentation.no_page_errors".to_string()]);
}

// ============================================================================
// Credentials and request policy
// ============================================================================

#[tokio::test]
async fn credentials_reach_the_backend() {
    let credentials = Credentials::new("admin", "honeypot");
    let header = credentials.authorization_header();
    let page = MockPage::compliant().with_required_auth(&header);

    let unauthenticated = run(page.clone()).await;
    assert!(outcome(&unauthenticated, "api.fetch_stats")
        .message()
        .contains("status 401"));

    let report = Verification::new(config().with_credentials(credentials))
        .execute(Box::new(MockDriver::new(page)))
        .await
        .unwrap();
    assert!(outcome(&report, "api.fetch_stats").is_pass());
    assert!(outcome(&report, "api.health").is_pass());
}

// ============================================================================
// Fatal runs
// ============================================================================

#[tokio::test]
async fn unreachable_dashboard_is_a_single_fatal_entry() {
    let config = config().with_navigation_timeout(Duration::from_millis(50));
    let page = MockPage::compliant().with_navigation(Navigation::Hang);
    let (fatal, driver) = run_fatal(page, config).await;

    assert!(matches!(fatal.error, DashError::Connectivity { .. }));
    assert!(fatal.ledger.is_empty());
    assert!(driver.is_closed());
    assert!(!driver.was_called("invoke:"));

    let text = Reporter::default().render_fatal(&fatal).unwrap();
    assert!(text.contains("FATAL: Could not connect to http://localhost:3333"));
    assert!(text.contains("RESULT: FATAL (0 checks recorded before abort)"));
}

#[tokio::test]
async fn refused_connection_reports_navigation_error() {
    let page = MockPage::compliant()
        .with_navigation(Navigation::Fail("net::ERR_CONNECTION_REFUSED".into()));
    let (fatal, driver) = run_fatal(page, config()).await;
    assert!(fatal.error.to_string().contains("ERR_CONNECTION_REFUSED"));
    assert!(driver.is_closed());
}

#[tokio::test]
async fn session_is_closed_after_a_completed_run() {
    let driver = MockDriver::new(MockPage::compliant());
    let observer = driver.clone();
    Verification::new(config())
        .execute(Box::new(driver))
        .await
        .unwrap();
    assert!(observer.is_closed());
    assert_eq!(observer.history().last().map(String::as_str), Some("close"));
}

// ============================================================================
// Reports
// ============================================================================

#[tokio::test]
async fn json_report_carries_ledger_and_status() {
    let report = run(MockPage::compliant().without_element("timeline-chart")).await;
    let json: serde_json::Value =
        serde_json::from_str(&Reporter::new(ReportFormat::Json).render(&report).unwrap()).unwrap();

    assert_eq!(json["status"]["verdict"], "FAIL");
    assert_eq!(json["status"]["failing"][0], "timeline.container");
    let timeline = json["ledger"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["key"] == "timeline")
        .unwrap();
    assert_eq!(timeline["checks"][0]["outcome"], "fail");
    assert_eq!(timeline["checks"][0]["reason"], "Element #timeline-chart not found");
}

#[tokio::test]
async fn selected_phases_run_alone() {
    let phases = dashcheck::phases::select(
        dashcheck::phases::standard_phases(&config()),
        &["export".to_string()],
    )
    .unwrap();
    let report = Verification::new(config())
        .with_phases(phases)
        .execute(Box::new(MockDriver::new(MockPage::compliant())))
        .await
        .unwrap();
    assert_eq!(report.ledger.phases().len(), 1);
    assert_eq!(report.status.total(), 4);
    assert!(report.status.is_pass());
}

// ============================================================================
// Page errors raised while checks run
// ============================================================================

#[tokio::test]
async fn page_error_during_marker_placement_fails_instrumentation() {
    let page = MockPage::compliant().with_function("addAttackMarker", |_, p| {
        *p.arrays.entry("attackMarkers".into()).or_insert(0) += 1;
        p.page_error("Uncaught TypeError: Cannot read properties of undefined (reading 'addTo')");
        Ok(serde_json::Value::Null)
    });
    let report = run(page).await;

    assert!(outcome(&report, "world_map.marker_increment").is_pass());
    let errors = outcome(&report, "instrumentation.no_page_errors");
    assert!(errors.is_fail());
    assert!(errors.message().contains("reading 'addTo'"));
    assert_eq!(report.status.failing().to_vec(), vec!["instrumentation.no_page_errors".to_string()]);
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn failed_close_still_reports_every_phase() {
    let page =
        MockPage::compliant().with_teardown(Teardown::Fail("Browser.close: connection reset".into()));
    let report = run(page).await;
    let text = Reporter::new(ReportFormat::Text).render(&report).unwrap();

    assert!(text.contains("RESULT: PASS (50 passed, 0 failed, 0 skipped of 50)"));
    assert!(text.contains("== Instrumentation =="));
    assert!(text.contains(
        "warning: session teardown failed: Evaluation failed: Browser.close: connection reset"
    ));
}
