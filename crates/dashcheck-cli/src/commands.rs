//! CLI command definitions using clap

use clap::{Parser, ValueEnum};
use dashcheck::{
    DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS,
    DEFAULT_TARGET,
};
use std::path::PathBuf;

/// Dashcheck: verify a live attack-monitoring dashboard in a real browser
///
/// Every option has a `DASHCHECK_*` environment fallback, so a bare
/// `dashcheck` checks the dashboard at the default origin.
#[derive(Parser, Debug)]
#[command(name = "dashcheck")]
#[command(author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged)
    #[arg(short, long)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, value_enum, default_value = "auto", env = "DASHCHECK_COLOR")]
    pub color: ColorArg,

    /// Dashboard origin
    #[arg(long, default_value = DEFAULT_TARGET, env = "DASHCHECK_TARGET")]
    pub target: String,

    /// Basic auth username (requires --password)
    #[arg(long, env = "DASHCHECK_USERNAME")]
    pub username: Option<String>,

    /// Basic auth password (requires --username)
    #[arg(long, env = "DASHCHECK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Delay after network idle before checks run
    #[arg(long, default_value_t = DEFAULT_SETTLE_DELAY_MS, env = "DASHCHECK_SETTLE_DELAY_MS")]
    pub settle_delay_ms: u64,

    /// Bound on navigation plus network idle
    #[arg(long, default_value_t = DEFAULT_NAVIGATION_TIMEOUT_MS, env = "DASHCHECK_NAVIGATION_TIMEOUT_MS")]
    pub navigation_timeout_ms: u64,

    /// Bound on each in-page evaluation
    #[arg(long, default_value_t = DEFAULT_PROBE_TIMEOUT_MS, env = "DASHCHECK_PROBE_TIMEOUT_MS")]
    pub probe_timeout_ms: u64,

    /// Show the browser window
    #[arg(long, env = "DASHCHECK_HEADED")]
    pub headed: bool,

    /// Chromium executable (auto-detected when omitted)
    #[arg(long, env = "DASHCHECK_CHROMIUM_PATH")]
    pub chromium_path: Option<PathBuf>,

    /// Disable the Chromium sandbox (containers)
    #[arg(long, env = "DASHCHECK_NO_SANDBOX")]
    pub no_sandbox: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text", env = "DASHCHECK_FORMAT")]
    pub format: FormatArg,

    /// Log format on stderr
    #[arg(long, value_enum, default_value = "text", env = "DASHCHECK_LOG_FORMAT")]
    pub log_format: LogFormatArg,

    /// Run only this phase (repeatable; key or display name)
    #[arg(long = "phase", value_name = "PHASE")]
    pub phases: Vec<String>,

    /// List every captured event in the text report
    #[arg(long)]
    pub events: bool,

    /// Also record network traffic whose URL matches this regex (repeatable)
    #[arg(long = "watch", value_name = "REGEX")]
    pub watch: Vec<String>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the phase catalogue and exit
    #[arg(long)]
    pub list_phases: bool,
}

/// Report format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Phase-grouped text
    #[default]
    Text,
    /// JSON document
    Json,
}

impl From<FormatArg> for dashcheck::ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for crate::config::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dashcheck").chain(args.iter().copied())).unwrap()
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let cli = parse(&[]);
            assert_eq!(cli.target, DEFAULT_TARGET);
            assert_eq!(cli.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
            assert_eq!(cli.format, FormatArg::Text);
            assert!(cli.phases.is_empty());
            assert!(!cli.headed);
        }

        #[test]
        fn test_repeated_watch() {
            let cli = parse(&["--watch", r"\.js$", "--watch", "/metrics"]);
            assert_eq!(cli.watch, [r"\.js$", "/metrics"]);
        }

        #[test]
        fn test_repeated_phase() {
            let cli = parse(&["--phase", "api", "--phase", "world_map"]);
            assert_eq!(cli.phases, ["api", "world_map"]);
        }

        #[test]
        fn test_credentials_and_format() {
            let cli = parse(&[
                "--target",
                "http://10.0.0.5:3333",
                "--username",
                "admin",
                "--password",
                "secret",
                "-f",
                "json",
                "-vv",
            ]);
            assert_eq!(cli.username.as_deref(), Some("admin"));
            assert_eq!(cli.format, FormatArg::Json);
            assert_eq!(cli.verbose, 2);
        }

        #[test]
        fn test_rejects_unknown_format() {
            assert!(Cli::try_parse_from(["dashcheck", "--format", "junit"]).is_err());
        }
    }

    mod conversion_tests {
        use super::*;
        use crate::config::{ColorChoice, LogFormat};

        #[test]
        fn test_conversions() {
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
            assert_eq!(LogFormat::from(LogFormatArg::Json), LogFormat::Json);
            assert_eq!(
                dashcheck::ReportFormat::from(FormatArg::Json),
                dashcheck::ReportFormat::Json
            );
        }
    }
}
