//! Harness error handling.
//!
//! Test-level failures (assertions, panics, rejected futures, timeouts) are
//! never errors: they become case outcomes. `HarnessError` covers the few
//! things that stop the harness itself from doing its job, such as registering
//! suites incorrectly or being handed a broken configuration.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for registration, configuration and reporting failures.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("cannot describe suite `{inner}` while suite `{outer}` is still being built")]
    #[diagnostic(
        code(acts::registry::nested_suite),
        help("suites cannot be nested; register `{inner}` after the builder of `{outer}` returns")
    )]
    NestedSuite { outer: String, inner: String },

    #[error("suite `{name}` is already registered")]
    #[diagnostic(
        code(acts::registry::duplicate_suite),
        help("suite names must be unique within one registry")
    )]
    DuplicateSuite { name: String },

    #[error("invalid case filter `{pattern}`")]
    #[diagnostic(code(acts::config::filter))]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(acts::config::invalid))]
    InvalidConfig { message: String },

    #[error("failed to read configuration from {}", path.display())]
    #[diagnostic(code(acts::config::io))]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration in {}", path.display())]
    #[diagnostic(
        code(acts::config::parse),
        help("expected a YAML mapping with keys such as `timeout_ms`, `filter`, `level`")
    )]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to start the async runtime")]
    #[diagnostic(code(acts::runtime))]
    Runtime(#[source] std::io::Error),

    #[error("failed to write the report")]
    #[diagnostic(code(acts::report::io))]
    ReportWrite(#[source] std::io::Error),

    #[error("failed to serialize the report")]
    #[diagnostic(code(acts::report::json))]
    ReportSerialize(#[from] serde_json::Error),
}

impl HarnessError {
    /// Shorthand for configuration values that parse but make no sense.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        HarnessError::InvalidConfig {
            message: message.into(),
        }
    }
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
