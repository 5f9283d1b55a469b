//! Verification runner: arguments in, rendered report and exit status out

use crate::commands::Cli;
use crate::config::{run_config, CliConfig};
use crate::error::{CliError, CliResult};
use dashcheck::phases::{select, standard_phases};
use dashcheck::{DashError, FatalRun, PageDriver, Reporter, Verdict, Verification};

/// Process exit status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Every check passed or was skipped
    Pass,
    /// At least one check failed
    Fail,
    /// The run could not complete
    Fatal,
}

impl Exit {
    /// Process exit code
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Pass => 0,
            Self::Fail => 1,
            Self::Fatal => 2,
        }
    }
}

impl From<Verdict> for Exit {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => Self::Pass,
            Verdict::Fail => Self::Fail,
        }
    }
}

/// A configured verification ready to run
#[derive(Debug, Clone)]
pub struct DashRunner {
    config: CliConfig,
    verification: Verification,
}

impl DashRunner {
    /// Build from parsed arguments
    ///
    /// # Errors
    ///
    /// Returns a configuration error for inconsistent options or an unknown
    /// phase selector.
    pub fn from_cli(cli: &Cli, config: CliConfig) -> CliResult<Self> {
        let run = run_config(cli)?;
        let phases = select(standard_phases(&run), &cli.phases).map_err(|e| match e {
            DashError::UnknownPhase { selector } => CliError::UnknownPhase { selector },
            other => CliError::Dash(other),
        })?;
        Ok(Self {
            config,
            verification: Verification::new(run).with_phases(phases),
        })
    }

    /// The verification this runner executes
    #[must_use]
    pub const fn verification(&self) -> &Verification {
        &self.verification
    }

    fn reporter(&self) -> Reporter {
        Reporter::new(self.config.format).with_events(self.config.list_events)
    }

    /// Run on the given driver and render the report
    ///
    /// A fatal run still renders (as a single fatal entry) and maps to
    /// [`Exit::Fatal`].
    pub async fn run_with(&self, driver: Box<dyn PageDriver>) -> CliResult<(Exit, String)> {
        match self.verification.execute(driver).await {
            Ok(report) => Ok((report.status.verdict().into(), self.reporter().render(&report)?)),
            Err(fatal) => self.fatal(&fatal),
        }
    }

    /// Render a failure to obtain a driver as a fatal run with an empty ledger
    pub fn launch_failed(&self, error: DashError) -> CliResult<(Exit, String)> {
        self.fatal(&FatalRun::unopened(&self.verification.config().target, error))
    }

    fn fatal(&self, fatal: &FatalRun) -> CliResult<(Exit, String)> {
        tracing::error!(error = %fatal.error, "run aborted");
        Ok((Exit::Fatal, self.reporter().render_fatal(fatal)?))
    }

    /// Launch Chromium and run
    #[cfg(feature = "browser")]
    pub async fn run(&self) -> CliResult<(Exit, String)> {
        match dashcheck::ChromiumDriver::launch(&self.verification.config().browser).await {
            Ok(driver) => self.run_with(Box::new(driver)).await,
            Err(error) => self.launch_failed(error),
        }
    }

    /// Without the `browser` feature there is no driver to run on
    #[cfg(not(feature = "browser"))]
    #[allow(clippy::unused_async)]
    pub async fn run(&self) -> CliResult<(Exit, String)> {
        Err(CliError::config(
            "built without the browser feature; rebuild with --features browser",
        ))
    }
}
