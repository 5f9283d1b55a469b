//! Dashcheck CLI Library
//!
//! Argument parsing, configuration, logging and report output for the
//! `dashcheck` binary.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, FormatArg, LogFormatArg};
pub use config::{run_config, CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{emit, phase_listing, Painter};
pub use runner::{DashRunner, Exit};
