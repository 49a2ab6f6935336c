//! Harness configuration.
//!
//! Values come from [`HarnessConfig::default`], optionally overlaid by a YAML
//! file, then by command-line flags (see [`crate::cli::args`]).
//!
//! ```yaml
//! timeout_ms: 5000
//! hook_timeout_ms: 5000
//! filter: "^KvStore::"
//! level: 0
//! format: text
//! color: auto
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use termcolor::ColorChoice;

use crate::errors::{HarnessError, Result};

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Configuration for test execution and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// How long a case may run before it is marked timed out.
    pub timeout_ms: u64,
    /// Same, for lifecycle hooks.
    pub hook_timeout_ms: u64,
    /// Regex matched against `suite::case`; non-matching cases are skipped.
    pub filter: Option<String>,
    /// Run only cases registered with this level.
    pub level: Option<u32>,
    pub format: OutputFormat,
    pub color: ColorMode,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            hook_timeout_ms: DEFAULT_TIMEOUT_MS,
            filter: None,
            level: None,
            format: OutputFormat::Text,
            color: ColorMode::Auto,
        }
    }
}

impl HarnessConfig {
    /// Loads a configuration file. Keys missing from the file keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| HarnessError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: HarnessConfig =
            serde_yaml::from_str(&content).map_err(|source| HarnessError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(HarnessError::invalid_config("timeout_ms must be greater than zero"));
        }
        if self.hook_timeout_ms == 0 {
            return Err(HarnessError::invalid_config(
                "hook_timeout_ms must be greater than zero",
            ));
        }
        self.compiled_filter()?;
        Ok(())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn case_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }

    pub fn compiled_filter(&self) -> Result<Option<Regex>> {
        self.filter
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| HarnessError::InvalidFilter {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Whether text output should carry ANSI colors.
    pub fn use_colors(&self) -> bool {
        match self.color {
            ColorMode::Auto => atty::is(atty::Stream::Stdout),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }

    pub fn color_choice(&self) -> ColorChoice {
        if self.use_colors() {
            ColorChoice::Always
        } else {
            ColorChoice::Never
        }
    }
}
