//! Structured run results.
//!
//! Rendering lives in [`crate::cli::output`]; this module only holds the data
//! and the counting rules.

use std::process::ExitCode;

use serde::Serialize;

use crate::outcome::Outcome;

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub level: u32,
    pub outcome: Outcome,
    /// Every failure observed: assertion diagnostics, panic/rejection
    /// messages, hook failures.
    pub diagnostics: Vec<String>,
    /// Matchers evaluated by the case body.
    pub assertions: usize,
    pub duration_ms: u64,
}

impl CaseReport {
    pub(crate) fn pending(name: &str, level: u32) -> Self {
        Self {
            name: name.to_string(),
            level,
            outcome: Outcome::Pending,
            diagnostics: Vec::new(),
            assertions: 0,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub skipped: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.timed_out + self.skipped
    }

    fn tally(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed { .. } | Outcome::Pending => self.failed += 1,
            Outcome::TimedOut { .. } => self.timed_out += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
        }
    }

    fn merge(&mut self, other: Counts) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.timed_out += other.timed_out;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub name: String,
    pub cases: Vec<CaseReport>,
    /// `beforeAll`/`afterAll` failures, which belong to no single case.
    pub hook_failures: Vec<String>,
}

impl SuiteReport {
    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for case in &self.cases {
            counts.tally(&case.outcome);
        }
        counts
    }

    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.name == name)
    }

    /// `case: diagnostic` for every failed or timed out case, then hook failures.
    pub fn failure_diagnostics(&self) -> Vec<String> {
        let mut out = Vec::new();
        for case in self.cases.iter().filter(|c| c.outcome.is_failure()) {
            if case.diagnostics.is_empty() {
                out.push(format!("{}: {}", case.name, case.outcome));
            }
            for diagnostic in &case.diagnostics {
                out.push(format!("{}: {}", case.name, diagnostic));
            }
        }
        out.extend(self.hook_failures.iter().cloned());
        out
    }

    pub fn has_failures(&self) -> bool {
        !self.hook_failures.is_empty() || self.cases.iter().any(|c| c.outcome.is_failure())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub suites: Vec<SuiteReport>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for suite in &self.suites {
            counts.merge(suite.counts());
        }
        counts
    }

    pub fn suite(&self, name: &str) -> Option<&SuiteReport> {
        self.suites.iter().find(|s| s.name == name)
    }

    pub fn case(&self, suite: &str, case: &str) -> Option<&CaseReport> {
        self.suite(suite).and_then(|s| s.case(case))
    }

    pub fn outcome(&self, suite: &str, case: &str) -> Option<&Outcome> {
        self.case(suite, case).map(|c| &c.outcome)
    }

    /// `suite::case` of every failed or timed out case.
    pub fn failed_paths(&self) -> Vec<String> {
        self.suites
            .iter()
            .flat_map(|s| {
                s.cases
                    .iter()
                    .filter(|c| c.outcome.is_failure())
                    .map(move |c| format!("{}::{}", s.name, c.name))
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.suites.iter().any(SuiteReport::has_failures)
    }

    /// `1` if any case failed or timed out or any hook failed, else `0`.
    pub fn exit_code(&self) -> ExitCode {
        if self.has_failures() {
            ExitCode::from(1)
        } else {
            ExitCode::SUCCESS
        }
    }
}
