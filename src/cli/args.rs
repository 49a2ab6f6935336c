//! Command-line arguments for harness binaries.
//!
//! Uses `clap` derive. Every flag is optional so that values from a
//! configuration file (or the defaults) show through.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::{ColorMode, HarnessConfig, OutputFormat};
use crate::errors::Result;

#[derive(Debug, Default, Parser)]
#[command(
    name = "acts",
    version,
    about = "Runs registered conformance suites and reports every case outcome."
)]
pub struct HarnessArgs {
    /// YAML configuration file. Flags override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Regex matched against `suite::case`; other cases are skipped.
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Run only cases registered with this level.
    #[arg(short, long)]
    pub level: Option<u32>,

    /// Case timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Hook timeout in milliseconds.
    #[arg(long)]
    pub hook_timeout_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    #[arg(long, value_enum)]
    pub color: Option<ColorMode>,

    /// List the cases `--filter` and `--level` select, without running them.
    #[arg(long)]
    pub list: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl HarnessArgs {
    /// Defaults, then the config file, then flags.
    pub fn resolve_config(&self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_yaml_file(path)?,
            None => HarnessConfig::default(),
        };
        if let Some(filter) = &self.filter {
            config.filter = Some(filter.clone());
        }
        if let Some(level) = self.level {
            config.level = Some(level);
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = ms;
        }
        if let Some(ms) = self.hook_timeout_ms {
            config.hook_timeout_ms = ms;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(color) = self.color {
            config.color = color;
        }
        config.validate()?;
        Ok(config)
    }
}
