//! A single-threaded async test harness with `describe`/`it`/`expect`
//! semantics, for application framework conformance suites.
//!
//! Suites are registered on a [`Registry`], run by a [`Runner`], and produce a
//! [`RunReport`]. Case bodies either call `done` (callback style, [`Suite::it`])
//! or return a future ([`Suite::it_async`]); assertion failures are recorded on
//! the running case rather than thrown.

pub use crate::config::{ColorMode, HarnessConfig, OutputFormat};
pub use crate::context::{Context, Done};
pub use crate::errors::HarnessError;
pub use crate::expect::{Contains, Expect};
pub use crate::outcome::Outcome;
pub use crate::report::{CaseReport, Counts, RunReport, SuiteReport};
pub use crate::runner::Runner;
pub use crate::suite::{Case, HookKind, IntoBodyResult, Registry, Suite};

pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod expect;
pub mod outcome;
pub mod report;
pub mod runner;
pub mod suite;
