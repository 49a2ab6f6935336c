//! The harness command-line front end.
//!
//! Test binaries build a [`Registry`] and hand it to [`main_with`], which
//! parses flags, sets up logging, runs the suites, prints the report and maps
//! the result to a process exit code: `0` all good, `1` some case or hook
//! failed, `2` the harness itself could not run.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::args::HarnessArgs;
use crate::errors::{HarnessError, Result};
use crate::runner::Runner;
use crate::suite::Registry;

pub mod args;
pub mod output;

/// Parses process arguments and runs `registry`.
pub fn main_with(registry: Registry) -> ExitCode {
    main_with_args(HarnessArgs::parse(), &registry)
}

pub fn main_with_args(args: HarnessArgs, registry: &Registry) -> ExitCode {
    init_tracing(args.verbose);
    match run(&args, registry) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::from(2)
        }
    }
}

fn run(args: &HarnessArgs, registry: &Registry) -> Result<ExitCode> {
    let runner = Runner::new(args.resolve_config()?)?;
    if args.list {
        let mut stdout = std::io::stdout().lock();
        output::write_listing(registry, &runner, &mut stdout)
            .map_err(HarnessError::ReportWrite)?;
        return Ok(ExitCode::SUCCESS);
    }

    let report = runner.run(registry)?;
    output::report_results(&report, runner.config())?;
    Ok(report.exit_code())
}

/// Installs a stderr `tracing` subscriber.
///
/// `-v` flags win over `RUST_LOG`; without either only warnings are shown.
/// Calling this twice is harmless.
pub fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}
