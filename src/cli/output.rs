//! Handles all user-facing output for the harness.
//!
//! Text reports go through any `termcolor::WriteColor`, which lets tests
//! render into a `termcolor::Buffer`. JSON reports are the serde
//! serialization of [`RunReport`].

use std::io::{self, Write};

use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

use crate::config::{HarnessConfig, OutputFormat};
use crate::errors::{HarnessError, Result};
use crate::outcome::Outcome;
use crate::report::{Counts, RunReport, SuiteReport};
use crate::runner::Runner;
use crate::suite::Registry;

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Prints `report` to stdout in the configured format.
pub fn report_results(report: &RunReport, config: &HarnessConfig) -> Result<()> {
    let mut stdout = StandardStream::stdout(config.color_choice());
    match config.format {
        OutputFormat::Text => write_text(report, &mut stdout).map_err(HarnessError::ReportWrite),
        OutputFormat::Json => write_json(report, &mut stdout),
    }
}

pub fn write_json<W: Write>(report: &RunReport, out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report).map_err(|e| {
        if e.is_io() {
            HarnessError::ReportWrite(e.into())
        } else {
            HarnessError::ReportSerialize(e)
        }
    })?;
    writeln!(out).map_err(HarnessError::ReportWrite)
}

pub fn write_text<W: WriteColor>(report: &RunReport, out: &mut W) -> io::Result<()> {
    for suite in &report.suites {
        write_suite(suite, out)?;
    }

    let counts = report.counts();
    write!(out, "\nTest summary: total {}, ", counts.total())?;
    write_counts(&counts, out)?;
    writeln!(out, " ({}ms)", report.duration_ms)?;

    let failed = report.failed_paths();
    if !failed.is_empty() {
        writeln!(out, "\nFailed tests:")?;
        for path in failed {
            writeln!(out, "  - {}", path)?;
        }
    }
    Ok(())
}

/// One `suite::case [level]` line per case the runner's level and filter
/// select.
pub fn write_listing<W: Write>(registry: &Registry, runner: &Runner, out: &mut W) -> io::Result<()> {
    for (suite, case, level) in registry.case_paths() {
        if runner.is_selected(&suite, &case, level) {
            writeln!(out, "{}::{} [level {}]", suite, case, level)?;
        }
    }
    Ok(())
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn outcome_color(outcome: &Outcome) -> Color {
    match outcome {
        Outcome::Passed => Color::Green,
        Outcome::Failed { .. } | Outcome::Pending => Color::Red,
        Outcome::TimedOut { .. } => Color::Magenta,
        Outcome::Skipped { .. } => Color::Yellow,
    }
}

fn colored<W: WriteColor>(out: &mut W, color: Color, bold: bool, text: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold))?;
    write!(out, "{}", text)?;
    out.reset()
}

fn write_suite<W: WriteColor>(suite: &SuiteReport, out: &mut W) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(out, "{}", suite.name)?;
    out.reset()?;

    for case in &suite.cases {
        write!(out, "  ")?;
        colored(out, outcome_color(&case.outcome), true, case.outcome.tag())?;
        write!(out, " {}", case.name)?;
        match &case.outcome {
            Outcome::TimedOut { after_ms } => write!(out, " (timed out after {}ms)", after_ms)?,
            Outcome::Skipped { reason } => write!(out, " ({})", reason)?,
            _ => write!(out, " ({}ms)", case.duration_ms)?,
        }
        writeln!(out)?;
        if case.outcome.is_failure() {
            for diagnostic in &case.diagnostics {
                write_diagnostic(diagnostic, out)?;
            }
        }
    }

    for failure in &suite.hook_failures {
        write!(out, "  ")?;
        colored(out, Color::Red, true, "HOOK")?;
        writeln!(out, " {}", failure)?;
    }

    write!(out, "  ")?;
    write_counts(&suite.counts(), out)?;
    writeln!(out)
}

/// Indents a diagnostic, coloring `-`/`+` diff lines.
fn write_diagnostic<W: WriteColor>(diagnostic: &str, out: &mut W) -> io::Result<()> {
    for line in diagnostic.lines() {
        write!(out, "      ")?;
        if line.starts_with('-') {
            colored(out, Color::Green, false, line)?;
        } else if line.starts_with('+') {
            colored(out, Color::Red, false, line)?;
        } else {
            write!(out, "{}", line)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_counts<W: WriteColor>(counts: &Counts, out: &mut W) -> io::Result<()> {
    colored(out, Color::Green, false, "passed")?;
    write!(out, " {}, ", counts.passed)?;
    colored(out, Color::Red, false, "failed")?;
    write!(out, " {}, ", counts.failed)?;
    colored(out, Color::Magenta, false, "timed out")?;
    write!(out, " {}, ", counts.timed_out)?;
    colored(out, Color::Yellow, false, "skipped")?;
    write!(out, " {}", counts.skipped)
}
