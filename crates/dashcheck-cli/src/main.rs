//! Dashcheck CLI: verify a live dashboard from the command line
//!
//! ## Usage
//!
//! ```bash
//! dashcheck                                   # Check http://localhost:3333
//! dashcheck --target http://10.0.0.5:3333     # Another origin
//! dashcheck --phase api --phase world_map     # Selected phases only
//! dashcheck --format json -o report.json      # Machine-readable report
//! ```
//!
//! Exit codes: 0 pass, 1 at least one failing check, 2 fatal.

use clap::Parser;
use dashcheck::phases::standard_phases;
use dashcheck_cli::{
    emit, logging, phase_listing, run_config, Cli, CliConfig, CliError, CliResult, DashRunner,
    Exit, Painter,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = CliConfig::from_cli(&cli);

    if let Err(e) = logging::init(&config) {
        eprintln!("Warning: {e}");
    }

    match run(&cli, config) {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(Exit::Fatal.code())
        }
    }
}

fn run(cli: &Cli, config: CliConfig) -> CliResult<Exit> {
    if cli.list_phases {
        print!("{}", phase_listing(&standard_phases(&run_config(cli)?)));
        return Ok(Exit::Pass);
    }

    let runner = DashRunner::from_cli(cli, config)?;
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::config(format!("Failed to create async runtime: {e}")))?;
    let (exit, report) = rt.block_on(runner.run())?;

    let painter = Painter::new(cli.output.is_none() && config.color.should_color());
    emit(&painter.paint(&report), cli.output.as_deref())?;
    Ok(exit)
}
