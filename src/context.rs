//! The handle every hook and case body receives.
//!
//! A `Context` bundles the three things a body can touch: its completion
//! signal, its assertion record, and the state shared by the suite. It is
//! cheap to clone, so callback-style bodies can move copies into the
//! callbacks they hand to the code under test.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tokio::sync::oneshot;
use tracing::debug;

use crate::expect::Expect;
use crate::outcome::{AssertionRecord, SharedRecord};

// =============================================================================
// COMPLETION SIGNAL
// =============================================================================

/// The `done` callback of one invocation.
///
/// Only the first call counts. Calls made after the invocation settled (for
/// example after it timed out) are ignored.
#[derive(Clone)]
pub struct Done {
    label: Rc<str>,
    sender: Rc<RefCell<Option<oneshot::Sender<()>>>>,
    record: SharedRecord,
}

impl Done {
    fn channel(label: Rc<str>, record: SharedRecord) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let done = Done {
            label,
            sender: Rc::new(RefCell::new(Some(tx))),
            record,
        };
        (done, rx)
    }

    /// Signals that the invocation finished.
    pub fn complete(&self) {
        let sender = self.sender.borrow_mut().take();
        match sender {
            Some(tx) => {
                if tx.send(()).is_err() {
                    debug!(target: "acts::done", invocation = %self.label, "late done ignored");
                }
            }
            None => {
                debug!(target: "acts::done", invocation = %self.label, "done called more than once");
            }
        }
    }

    /// Records `reason` as a failure, then completes.
    pub fn fail(&self, reason: impl Into<String>) {
        self.record.borrow_mut().fail(reason);
        self.complete();
    }

    pub fn is_completed(&self) -> bool {
        self.sender.borrow().is_none()
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("invocation", &self.label)
            .field("completed", &self.is_completed())
            .finish()
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

pub struct Context<S = ()> {
    label: Rc<str>,
    record: SharedRecord,
    done: Done,
    state: Rc<RefCell<S>>,
}

impl<S> Clone for Context<S> {
    fn clone(&self) -> Self {
        Context {
            label: self.label.clone(),
            record: self.record.clone(),
            done: self.done.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S> Context<S> {
    /// Builds the context for one invocation along with the receiving end of
    /// its `done` signal.
    pub(crate) fn new(label: &str, state: Rc<RefCell<S>>) -> (Self, oneshot::Receiver<()>) {
        let label: Rc<str> = Rc::from(label);
        let record = AssertionRecord::shared();
        let (done, rx) = Done::channel(label.clone(), record.clone());
        let cx = Context {
            label,
            record,
            done,
            state,
        };
        (cx, rx)
    }

    /// `suite::case` or `suite::hook` of the running invocation.
    pub fn name(&self) -> &str {
        &self.label
    }

    /// Starts an assertion against `actual`.
    pub fn expect<T>(&self, actual: T) -> Expect<T> {
        Expect::new(actual, self.record.clone())
    }

    pub fn done(&self) {
        self.done.complete();
    }

    /// A standalone `done` callback, for handing to code that only needs to
    /// signal completion.
    pub fn done_handle(&self) -> Done {
        self.done.clone()
    }

    /// The suite state shared by every hook and case of the current run.
    pub fn state(&self) -> Rc<RefCell<S>> {
        self.state.clone()
    }

    /// Runs `f` with mutable access to the suite state.
    ///
    /// Do not hold on to the borrow across an `.await`.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    pub(crate) fn record(&self) -> &SharedRecord {
        &self.record
    }
}

impl<S> fmt::Debug for Context<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("invocation", &self.label)
            .field("done", &self.done)
            .finish()
    }
}
