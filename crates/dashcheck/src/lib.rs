//! Dashcheck: Browser-Driven Verification for Attack-Monitoring Dashboards
//!
//! Dashcheck opens a live dashboard in a browser, waits for it to settle and
//! runs a fixed catalogue of checks against the page and its backend API.
//! Every check produces exactly one outcome; one broken feature never hides
//! the rest of the report.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   DASHCHECK Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Phase      │    │ Phase      │    │ Session    │            │
//! │   │ Catalogue  │───►│ Runner     │───►│ + Driver   │            │
//! │   │ (data)     │    │ (isolated) │    │ (chromium) │            │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │                           ▼                                     │
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Reporter   │◄───│ Overall    │◄───│ Ledger     │            │
//! │   │ text/json  │    │ Status     │    │ (append)   │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use dashcheck::mock::{MockDriver, MockPage};
//! use dashcheck::{RunConfig, Verification};
//!
//! # async fn demo() {
//! let verification = Verification::new(RunConfig::new("http://localhost:3333"));
//! let driver = MockDriver::new(MockPage::compliant());
//! match verification.execute(Box::new(driver)).await {
//!     Ok(report) => println!("{}", report.status.verdict()),
//!     Err(fatal) => eprintln!("{fatal}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod api;
mod check;
mod config;
mod driver;
mod hooks;
mod ledger;
mod probe;
mod reporter;
mod result;
mod runner;
mod script;
mod session;
mod status;

pub mod contract;
pub mod mock;
pub mod phases;

#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod cdp;

pub use api::{ApiClient, HealthResponse, MapData, RecentAttack, StatsResponse, TopCounts};
#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;
pub use check::{CheckOutcome, CheckSpec, OutcomeTag, Phase, Probe, SyntheticInput};
pub use config::{
    BrowserConfig, Credentials, RunConfig, DEFAULT_NAVIGATION_TIMEOUT_MS,
    DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS, DEFAULT_TARGET, NETWORK_IDLE_THRESHOLD_MS,
};
pub use driver::{PageDriver, RequestPolicy, CONDITIONAL_HEADERS};
pub use hooks::{EventKind, EventRecord, EventSink, Instrumentation, UrlPattern};
pub use ledger::{CheckRecord, Ledger, PhaseRecord};
pub use probe::{Invocation, PageProbe};
pub use reporter::{ReportFormat, Reporter};
pub use result::{DashError, DashResult};
pub use runner::{Aborted, FatalRun, PhaseRunner, RunReport, Verification};
pub use script::{ChannelState, ElementState, FetchResult, InvokeResult, PageScript};
pub use session::{Scoped, Session};
pub use status::{OverallStatus, Verdict};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::mock::{MockDriver, MockPage};
    pub use super::phases::standard_phases;
    pub use super::{
        CheckOutcome, DashError, DashResult, Ledger, OutcomeTag, OverallStatus, PageDriver,
        ReportFormat, Reporter, RunConfig, RunReport, Verdict, Verification,
    };
}
