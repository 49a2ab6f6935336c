//! Suite execution.
//!
//! Everything runs on one thread: a tokio current-thread runtime driving a
//! `LocalSet`, so bodies and the tasks they spawn need not be `Send`. One
//! invocation (hook or case body) is in flight at a time.
//!
//! Every invocation goes through [`Runner::invoke`], which implements the
//! single completion contract: the invocation settles on the first of `done`,
//! the returned future resolving, a panic, or the timeout.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Once;
use std::time::{Duration, Instant};

use futures::future::{self, FutureExt, LocalBoxFuture};
use regex::Regex;
use tokio::task::LocalSet;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::context::Context;
use crate::errors::{HarnessError, Result};
use crate::outcome::Outcome;
use crate::report::{CaseReport, RunReport, SuiteReport};
use crate::suite::{BodyFn, Case, HookKind, Registry, Suite};

// =============================================================================
// TYPE-ERASED SUITES
// =============================================================================

/// A registered suite with its state type erased.
pub(crate) trait SuiteRun {
    fn name(&self) -> &str;
    fn case_list(&self) -> Vec<(String, u32)>;
    fn run<'a>(&'a self, runner: &'a Runner) -> LocalBoxFuture<'a, SuiteReport>;
}

impl<S: Default + 'static> SuiteRun for Suite<S> {
    fn name(&self) -> &str {
        Suite::name(self)
    }

    fn case_list(&self) -> Vec<(String, u32)> {
        self.cases()
            .iter()
            .map(|c| (c.name().to_string(), c.level()))
            .collect()
    }

    fn run<'a>(&'a self, runner: &'a Runner) -> LocalBoxFuture<'a, SuiteReport> {
        runner.run_suite(self).boxed_local()
    }
}

// =============================================================================
// INVOCATIONS
// =============================================================================

#[derive(Debug)]
enum Settled {
    Completed,
    Threw(String),
    TimedOut(Duration),
}

/// How one hook or body invocation ended, plus what its matchers recorded.
#[derive(Debug)]
struct Invocation {
    settled: Settled,
    failures: Vec<String>,
    assertions: usize,
}

impl Invocation {
    /// `Err` carries the reason the invocation counts as failed.
    fn verdict(&self) -> std::result::Result<(), String> {
        match &self.settled {
            Settled::TimedOut(after) => Err(format!("timed out after {}ms", after.as_millis())),
            Settled::Threw(message) => Err(self
                .failures
                .first()
                .cloned()
                .unwrap_or_else(|| message.clone())),
            Settled::Completed => match self.failures.first() {
                Some(first) => Err(first.clone()),
                None => Ok(()),
            },
        }
    }

    fn outcome(&self) -> Outcome {
        match (&self.settled, self.verdict()) {
            (Settled::TimedOut(after), _) => Outcome::TimedOut {
                after_ms: after.as_millis() as u64,
            },
            (_, Ok(())) => Outcome::Passed,
            (_, Err(reason)) => Outcome::Failed { reason },
        }
    }

    fn diagnostics(&self) -> Vec<String> {
        let mut out = self.failures.clone();
        match &self.settled {
            Settled::Threw(message) => out.push(message.clone()),
            Settled::TimedOut(after) => out.push(format!("timed out after {}ms", after.as_millis())),
            Settled::Completed => {}
        }
        out
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked with a non-string payload".to_string()
    }
}

// =============================================================================
// QUIET PANICS
// =============================================================================

thread_local! {
    static QUIET_PANICS: Cell<bool> = const { Cell::new(false) };
}

/// Wraps the process panic hook once. While an invocation is running on the
/// current thread, caught panics go to the `acts::runner` debug log instead
/// of stderr; everything else reaches the previous hook unchanged.
fn install_quiet_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if QUIET_PANICS.with(Cell::get) {
                let location = info
                    .location()
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "unknown location".to_string());
                debug!(
                    target: "acts::runner",
                    %location,
                    "{}",
                    panic_message(info.payload())
                );
            } else {
                previous(info);
            }
        }));
    });
}

/// Silences panics on this thread until dropped.
struct QuietPanics {
    was_quiet: bool,
}

impl QuietPanics {
    fn enter() -> Self {
        QuietPanics {
            was_quiet: QUIET_PANICS.with(|q| q.replace(true)),
        }
    }
}

impl Drop for QuietPanics {
    fn drop(&mut self) {
        QUIET_PANICS.with(|q| q.set(self.was_quiet));
    }
}

fn label(suite: &str, part: &str) -> String {
    format!("{}::{}", suite, part)
}

// =============================================================================
// RUNNER
// =============================================================================

pub struct Runner {
    config: HarnessConfig,
    filter: Option<Regex>,
}

impl Runner {
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let filter = config.compiled_filter()?;
        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Runs every registered suite on a fresh current-thread runtime.
    pub fn run(&self, registry: &Registry) -> Result<RunReport> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(HarnessError::Runtime)?;
        let local = LocalSet::new();
        Ok(local.block_on(&runtime, self.run_local(registry)))
    }

    /// Runs every registered suite on the caller's runtime.
    ///
    /// Must be polled inside a [`LocalSet`] with the time driver enabled,
    /// since bodies may `spawn_local` and sleep.
    pub async fn run_local(&self, registry: &Registry) -> RunReport {
        install_quiet_panic_hook();
        let started = Instant::now();
        let suites = registry.snapshot();
        info!(target: "acts::runner", suites = suites.len(), "run started");

        let mut reports = Vec::with_capacity(suites.len());
        for suite in &suites {
            reports.push(suite.run(self).await);
        }

        let report = RunReport {
            suites: reports,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        let counts = report.counts();
        info!(
            target: "acts::runner",
            passed = counts.passed,
            failed = counts.failed,
            timed_out = counts.timed_out,
            skipped = counts.skipped,
            "run finished"
        );
        report
    }

    /// Whether the configured level and filter select `suite::case`.
    pub fn is_selected(&self, suite: &str, case_name: &str, level: u32) -> bool {
        self.skip_reason(suite, case_name, level).is_none()
    }

    fn skip_reason(&self, suite: &str, case_name: &str, level: u32) -> Option<String> {
        if let Some(wanted) = self.config.level {
            if level != wanted {
                return Some(format!("level {} excluded (running level {})", level, wanted));
            }
        }
        if let Some(filter) = &self.filter {
            if !filter.is_match(&label(suite, case_name)) {
                return Some(format!("filtered out by `{}`", filter.as_str()));
            }
        }
        None
    }

    async fn run_suite<S: Default + 'static>(&self, suite: &Suite<S>) -> SuiteReport {
        let name = suite.name();
        let mut cases: Vec<CaseReport> = suite
            .cases()
            .iter()
            .map(|c| CaseReport::pending(c.name(), c.level()))
            .collect();
        let mut hook_failures = Vec::new();

        let mut runnable = Vec::new();
        for (index, case) in suite.cases().iter().enumerate() {
            match self.skip_reason(name, case.name(), case.level()) {
                Some(reason) => cases[index].outcome = Outcome::Skipped { reason },
                None => runnable.push(index),
            }
        }
        if runnable.is_empty() {
            debug!(target: "acts::runner", suite = name, "nothing to run");
            return SuiteReport {
                name: name.to_string(),
                cases,
                hook_failures,
            };
        }

        info!(target: "acts::runner", suite = name, cases = runnable.len(), "suite started");
        let state = Rc::new(RefCell::new(S::default()));
        let case_timeout = suite.timeout.unwrap_or_else(|| self.config.case_timeout());

        if let Err(reason) = self.run_hook(suite, HookKind::BeforeAll, &state).await {
            let reason = format!("beforeAll hook failed: {}", reason);
            warn!(target: "acts::runner", suite = name, %reason, "skipping suite");
            for index in runnable {
                cases[index].outcome = Outcome::failed(reason.clone());
                cases[index].diagnostics.push(reason.clone());
            }
            hook_failures.push(reason);
            return SuiteReport {
                name: name.to_string(),
                cases,
                hook_failures,
            };
        }

        for index in runnable {
            self.run_case(suite, &suite.cases()[index], &state, case_timeout, &mut cases[index])
                .await;
        }

        if let Err(reason) = self.run_hook(suite, HookKind::AfterAll, &state).await {
            let reason = format!("afterAll hook failed: {}", reason);
            warn!(target: "acts::runner", suite = name, %reason);
            hook_failures.push(reason);
        }

        SuiteReport {
            name: name.to_string(),
            cases,
            hook_failures,
        }
    }

    async fn run_case<S: 'static>(
        &self,
        suite: &Suite<S>,
        case: &Case<S>,
        state: &Rc<RefCell<S>>,
        timeout: Duration,
        report: &mut CaseReport,
    ) {
        let started = Instant::now();
        let path = label(suite.name(), case.name());
        let mut diagnostics = Vec::new();

        let mut outcome = match self.run_hook(suite, HookKind::BeforeEach, state).await {
            Err(reason) => {
                let reason = format!("beforeEach hook failed: {}", reason);
                diagnostics.push(reason.clone());
                Outcome::Failed { reason }
            }
            Ok(()) => {
                let invocation = self.invoke(&case.body, &path, state, timeout).await;
                report.assertions = invocation.assertions;
                diagnostics.extend(invocation.diagnostics());
                invocation.outcome()
            }
        };

        if let Err(reason) = self.run_hook(suite, HookKind::AfterEach, state).await {
            let reason = format!("afterEach hook failed: {}", reason);
            diagnostics.push(reason.clone());
            if outcome.is_passed() {
                outcome = Outcome::Failed { reason };
            }
        }

        match &outcome {
            Outcome::Passed => debug!(target: "acts::runner", case = %path, "passed"),
            Outcome::TimedOut { after_ms } => {
                warn!(target: "acts::runner", case = %path, after_ms, "timed out")
            }
            other => info!(target: "acts::runner", case = %path, outcome = %other),
        }

        report.outcome = outcome;
        report.diagnostics = diagnostics;
        report.duration_ms = started.elapsed().as_millis() as u64;
    }

    /// Runs a hook if the suite has one. A missing hook always succeeds.
    async fn run_hook<S: 'static>(
        &self,
        suite: &Suite<S>,
        kind: HookKind,
        state: &Rc<RefCell<S>>,
    ) -> std::result::Result<(), String> {
        match suite.hook(kind) {
            Some(body) => {
                let path = label(suite.name(), kind.as_str());
                self.invoke(body, &path, state, self.config.hook_timeout())
                    .await
                    .verdict()
            }
            None => Ok(()),
        }
    }

    async fn invoke<S: 'static>(
        &self,
        body: &BodyFn<S>,
        path: &str,
        state: &Rc<RefCell<S>>,
        timeout: Duration,
    ) -> Invocation {
        let (cx, done_rx) = Context::new(path, state.clone());
        let record = cx.record().clone();
        debug!(target: "acts::runner", invocation = path, "invoking");
        let quiet = QuietPanics::enter();

        let settled = match panic::catch_unwind(AssertUnwindSafe(|| body(cx))) {
            Err(payload) => Settled::Threw(panic_message(&*payload)),
            Ok(returned) => {
                let body_settled = async move {
                    match returned {
                        Some(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                            Ok(Ok(())) => Settled::Completed,
                            Ok(Err(message)) => Settled::Threw(message),
                            Err(payload) => Settled::Threw(panic_message(&*payload)),
                        },
                        None => future::pending().await,
                    }
                };
                // A dropped sender can never complete the invocation; only the
                // timeout can.
                let done_settled = async move {
                    match done_rx.await {
                        Ok(()) => Settled::Completed,
                        Err(_) => future::pending().await,
                    }
                };
                let race = async move {
                    tokio::select! {
                        settled = body_settled => settled,
                        settled = done_settled => settled,
                    }
                };
                match tokio::time::timeout(timeout, race).await {
                    Ok(settled) => settled,
                    Err(_) => Settled::TimedOut(timeout),
                }
            }
        };
        drop(quiet);

        let mut record = record.borrow_mut();
        record.close();
        Invocation {
            settled,
            failures: record.failures().to_vec(),
            assertions: record.evaluated(),
        }
    }
}
