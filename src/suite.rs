//! Suite registration: `describe`, lifecycle hooks and `it`.
//!
//! A [`Registry`] collects suites in registration order. Each suite is built
//! synchronously by the closure given to [`Registry::describe`], which
//! receives the [`Suite`] under construction:
//!
//! ```rust,no_run
//! use acts_harness::{HarnessConfig, Registry, Runner};
//!
//! let registry = Registry::new();
//! registry
//!     .describe("S", |s| {
//!         s.it("c1", 0, |cx| {
//!             cx.expect(1 + 1).assert_equal(2);
//!             cx.done();
//!         });
//!     })
//!     .unwrap();
//! let report = Runner::new(HarnessConfig::default()).unwrap().run(&registry).unwrap();
//! assert!(report.outcome("S", "c1").unwrap().is_passed());
//! ```

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};

use crate::context::Context;
use crate::errors::{HarnessError, Result};
use crate::runner::SuiteRun;

// =============================================================================
// BODIES
// =============================================================================

pub(crate) type BodyFuture = LocalBoxFuture<'static, std::result::Result<(), String>>;

/// A hook or case body. `None` means callback style: only `done` completes it.
pub(crate) type BodyFn<S> = Box<dyn Fn(Context<S>) -> Option<BodyFuture>>;

/// What an async body may resolve to. An `Err` counts as a rejection.
pub trait IntoBodyResult {
    fn into_body_result(self) -> std::result::Result<(), String>;
}

impl IntoBodyResult for () {
    fn into_body_result(self) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl<E: fmt::Display> IntoBodyResult for std::result::Result<(), E> {
    fn into_body_result(self) -> std::result::Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}

fn callback_body<S: 'static, F>(f: F) -> BodyFn<S>
where
    F: Fn(Context<S>) + 'static,
{
    let body: BodyFn<S> = Box::new(move |cx: Context<S>| {
        f(cx);
        None
    });
    body
}

fn future_body<S: 'static, F, Fut, R>(f: F) -> BodyFn<S>
where
    F: Fn(Context<S>) -> Fut + 'static,
    Fut: Future<Output = R> + 'static,
    R: IntoBodyResult + 'static,
{
    let body: BodyFn<S> = Box::new(move |cx: Context<S>| {
        let fut: BodyFuture = f(cx).map(R::into_body_result).boxed_local();
        Some(fut)
    });
    body
}

// =============================================================================
// SUITE AND CASE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::BeforeAll => "beforeAll",
            HookKind::AfterAll => "afterAll",
            HookKind::BeforeEach => "beforeEach",
            HookKind::AfterEach => "afterEach",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Case<S> {
    name: String,
    level: u32,
    pub(crate) body: BodyFn<S>,
}

impl<S> Case<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Informational level passed to `it`; only used for filtering.
    pub fn level(&self) -> u32 {
        self.level
    }
}

/// A named collection of cases plus lifecycle hooks.
///
/// `S` is the suite state: created with `S::default()` at the start of every
/// run of the suite and shared by all of its hooks and cases.
pub struct Suite<S = ()> {
    name: String,
    pub(crate) before_all: Option<BodyFn<S>>,
    pub(crate) after_all: Option<BodyFn<S>>,
    pub(crate) before_each: Option<BodyFn<S>>,
    pub(crate) after_each: Option<BodyFn<S>>,
    pub(crate) cases: Vec<Case<S>>,
    pub(crate) timeout: Option<Duration>,
}

impl<S: 'static> Suite<S> {
    fn new(name: String) -> Self {
        Self {
            name,
            before_all: None,
            after_all: None,
            before_each: None,
            after_each: None,
            cases: Vec::new(),
            timeout: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cases(&self) -> &[Case<S>] {
        &self.cases
    }

    pub fn has_hook(&self, kind: HookKind) -> bool {
        self.hook(kind).is_some()
    }

    pub(crate) fn hook(&self, kind: HookKind) -> Option<&BodyFn<S>> {
        match kind {
            HookKind::BeforeAll => self.before_all.as_ref(),
            HookKind::AfterAll => self.after_all.as_ref(),
            HookKind::BeforeEach => self.before_each.as_ref(),
            HookKind::AfterEach => self.after_each.as_ref(),
        }
    }

    // Last registration wins.
    fn set_hook(&mut self, kind: HookKind, body: BodyFn<S>) -> &mut Self {
        let slot = match kind {
            HookKind::BeforeAll => &mut self.before_all,
            HookKind::AfterAll => &mut self.after_all,
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterEach => &mut self.after_each,
        };
        *slot = Some(body);
        self
    }

    /// Overrides the configured case timeout for this suite's cases.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn before_all<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context<S>) + 'static,
    {
        self.set_hook(HookKind::BeforeAll, callback_body(f))
    }

    pub fn before_all_async<F, Fut, R>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context<S>) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: IntoBodyResult + 'static,
    {
        self.set_hook(HookKind::BeforeAll, future_body(f))
    }

    pub fn after_all<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context<S>) + 'static,
    {
        self.set_hook(HookKind::AfterAll, callback_body(f))
    }

    pub fn after_all_async<F, Fut, R>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context<S>) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: IntoBodyResult + 'static,
    {
        self.set_hook(HookKind::AfterAll, future_body(f))
    }

    pub fn before_each<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context<S>) + 'static,
    {
        self.set_hook(HookKind::BeforeEach, callback_body(f))
    }

    pub fn before_each_async<F, Fut, R>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context<S>) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: IntoBodyResult + 'static,
    {
        self.set_hook(HookKind::BeforeEach, future_body(f))
    }

    pub fn after_each<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context<S>) + 'static,
    {
        self.set_hook(HookKind::AfterEach, callback_body(f))
    }

    pub fn after_each_async<F, Fut, R>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context<S>) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: IntoBodyResult + 'static,
    {
        self.set_hook(HookKind::AfterEach, future_body(f))
    }

    /// Registers a callback-style case. It completes when `cx.done()` (or a
    /// [`Done`](crate::Done) handle) is called.
    pub fn it<F>(&mut self, name: impl Into<String>, level: u32, f: F) -> &mut Self
    where
        F: Fn(Context<S>) + 'static,
    {
        self.push_case(name.into(), level, callback_body(f))
    }

    /// Registers a case whose future completes it, unless `done` fires first.
    ///
    /// A body that only ends by panicking has no inferable output type; name
    /// it with `it_async::<_, _, ()>`.
    pub fn it_async<F, Fut, R>(&mut self, name: impl Into<String>, level: u32, f: F) -> &mut Self
    where
        F: Fn(Context<S>) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: IntoBodyResult + 'static,
    {
        self.push_case(name.into(), level, future_body(f))
    }

    fn push_case(&mut self, name: String, level: u32, body: BodyFn<S>) -> &mut Self {
        self.cases.push(Case { name, level, body });
        self
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Suites in registration order, ready to be handed to a [`Runner`](crate::Runner).
#[derive(Default)]
pub struct Registry {
    suites: RefCell<Vec<Rc<dyn SuiteRun>>>,
    building: RefCell<Option<String>>,
}

/// Clears the "currently building" marker even if the builder panics.
struct BuildGuard<'a>(&'a RefCell<Option<String>>);

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        *self.0.borrow_mut() = None;
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a suite without state.
    pub fn describe<F>(&self, name: impl Into<String>, build: F) -> Result<()>
    where
        F: FnOnce(&mut Suite<()>),
    {
        self.describe_with_state::<(), F>(name, build)
    }

    /// Registers a suite whose hooks and cases share a fresh `S` per run.
    pub fn describe_with_state<S, F>(&self, name: impl Into<String>, build: F) -> Result<()>
    where
        S: Default + 'static,
        F: FnOnce(&mut Suite<S>),
    {
        let name = name.into();
        {
            let mut building = self.building.borrow_mut();
            if let Some(outer) = building.as_ref() {
                return Err(HarnessError::NestedSuite {
                    outer: outer.clone(),
                    inner: name,
                });
            }
            if self.suites.borrow().iter().any(|s| s.name() == name) {
                return Err(HarnessError::DuplicateSuite { name });
            }
            *building = Some(name.clone());
        }
        let guard = BuildGuard(&self.building);

        let mut suite = Suite::new(name);
        build(&mut suite);
        drop(guard);

        self.suites.borrow_mut().push(Rc::new(suite));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.suites.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.borrow().is_empty()
    }

    pub fn suite_names(&self) -> Vec<String> {
        self.suites.borrow().iter().map(|s| s.name().to_string()).collect()
    }

    /// `(suite, case, level)` for every registered case, in run order.
    pub fn case_paths(&self) -> Vec<(String, String, u32)> {
        self.suites
            .borrow()
            .iter()
            .flat_map(|s| {
                let suite = s.name().to_string();
                s.case_list()
                    .into_iter()
                    .map(move |(case, level)| (suite.clone(), case, level))
            })
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<Rc<dyn SuiteRun>> {
        self.suites.borrow().clone()
    }
}
