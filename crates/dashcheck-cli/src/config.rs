//! CLI configuration

use crate::commands::Cli;
use crate::error::{CliError, CliResult};
use dashcheck::{BrowserConfig, Credentials, ReportFormat, RunConfig, UrlPattern};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - warnings and errors
    #[default]
    Normal,
    /// Verbose - phase progress
    Verbose,
    /// Debug - every check
    Debug,
}

impl Verbosity {
    /// Verbosity from `-q` and the `-v` count
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Log filter used when `RUST_LOG` is unset
    #[must_use]
    pub const fn log_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stdout()),
        }
    }
}

/// Log line format on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Text,
    /// JSON lines
    Json,
}

/// CLI configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Report format
    pub format: ReportFormat,
    /// Log format
    pub log_format: LogFormat,
    /// List events in text reports
    pub list_events: bool,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Presentation settings from parsed arguments
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            verbosity: Verbosity::from_flags(cli.quiet, cli.verbose),
            color: cli.color.into(),
            format: cli.format.into(),
            log_format: cli.log_format.into(),
            list_events: cli.events,
        }
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set report format
    #[must_use]
    pub const fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }
}

/// Run configuration from parsed arguments
///
/// # Errors
///
/// Returns a configuration error when only one of username and password is
/// given, a duration is zero, or a `--watch` regex does not compile.
pub fn run_config(cli: &Cli) -> CliResult<RunConfig> {
    if cli.navigation_timeout_ms == 0 || cli.probe_timeout_ms == 0 {
        return Err(CliError::config("timeouts must be greater than zero"));
    }

    let mut browser = BrowserConfig::default().with_headless(!cli.headed);
    if let Some(path) = &cli.chromium_path {
        browser = browser.with_chromium_path(path.to_string_lossy());
    }
    if cli.no_sandbox {
        browser = browser.with_no_sandbox();
    }

    let mut config = RunConfig::new(cli.target.trim_end_matches('/'))
        .with_settle_delay(Duration::from_millis(cli.settle_delay_ms))
        .with_navigation_timeout(Duration::from_millis(cli.navigation_timeout_ms))
        .with_probe_timeout(Duration::from_millis(cli.probe_timeout_ms))
        .with_browser(browser);
    for pattern in &cli.watch {
        let pattern = UrlPattern::regex(pattern)
            .map_err(|e| CliError::config(format!("invalid --watch pattern: {e}")))?;
        config = config.with_interesting_endpoint(pattern);
    }

    match (&cli.username, &cli.password) {
        (Some(user), Some(pass)) => config = config.with_credentials(Credentials::new(user, pass)),
        (None, None) => {}
        _ => {
            return Err(CliError::config(
                "--username and --password must be given together",
            ))
        }
    }
    Ok(config)
}
