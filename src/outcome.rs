//! Case outcomes and the assertion record they are derived from.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

// =============================================================================
// OUTCOME
// =============================================================================

/// The final disposition of a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Not run yet.
    Pending,
    Passed,
    /// The first failure recorded for the case.
    Failed { reason: String },
    /// No completion signal arrived within the timeout.
    TimedOut { after_ms: u64 },
    /// Excluded by a filter; hooks did not run for it.
    Skipped { reason: String },
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// True for outcomes that should fail a CI run.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. } | Outcome::TimedOut { .. })
    }

    /// Short uppercase tag used by the text reporter.
    pub fn tag(&self) -> &'static str {
        match self {
            Outcome::Pending => "PEND",
            Outcome::Passed => "PASS",
            Outcome::Failed { .. } => "FAIL",
            Outcome::TimedOut { .. } => "TIME",
            Outcome::Skipped { .. } => "SKIP",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => write!(f, "pending"),
            Outcome::Passed => write!(f, "passed"),
            Outcome::Failed { reason } => write!(f, "failed: {}", reason),
            Outcome::TimedOut { after_ms } => write!(f, "timed out after {}ms", after_ms),
            Outcome::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}

// =============================================================================
// ASSERTION RECORD
// =============================================================================

/// Assertions evaluated during one invocation of a hook or case body.
///
/// The record closes when the invocation settles. Anything reported after
/// that (a late matcher call from a spawned task, say) is dropped.
#[derive(Debug, Default)]
pub struct AssertionRecord {
    failures: Vec<String>,
    evaluated: usize,
    closed: bool,
}

pub type SharedRecord = Rc<RefCell<AssertionRecord>>;

impl AssertionRecord {
    pub fn shared() -> SharedRecord {
        Rc::new(RefCell::new(AssertionRecord::default()))
    }

    /// Counts a matcher that held. Returns false if the record is closed.
    pub fn pass(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.evaluated += 1;
        true
    }

    /// Appends a failure diagnostic. Returns false if the record is closed.
    pub fn fail(&mut self, diagnostic: impl Into<String>) -> bool {
        if self.closed {
            return false;
        }
        self.evaluated += 1;
        self.failures.push(diagnostic.into());
        true
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The failure that decides the outcome; later ones are diagnostics only.
    pub fn first_failure(&self) -> Option<&str> {
        self.failures.first().map(String::as_str)
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn evaluated(&self) -> usize {
        self.evaluated
    }
}
