//! Log subscriber setup
//!
//! Logs go to stderr so stdout carries only the report. `RUST_LOG` wins over
//! the verbosity flags.

use crate::config::{CliConfig, LogFormat};
use crate::error::{CliError, CliResult};
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, else from the configured verbosity
#[must_use]
pub fn env_filter(config: &CliConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_directive()))
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns [`CliError::Logging`] if a subscriber is already installed.
pub fn init(config: &CliConfig) -> CliResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder
            .with_ansi(config.color.should_color())
            .try_init(),
    };
    installed.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Verbosity;

    #[test]
    fn test_filter_follows_verbosity_without_rust_log() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let filter = env_filter(&CliConfig::new().with_verbosity(Verbosity::Debug));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_second_init_fails() {
        let config = CliConfig::new();
        let _ = init(&config);
        assert!(matches!(init(&config), Err(CliError::Logging { .. })));
    }
}
