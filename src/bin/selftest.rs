// Harness self-test: suites written the way conformance files are, run
// against an in-process key-value store double instead of a device SDK.
// Usage: cargo run --bin acts-selftest -- [--filter REGEX] [--level N] [--timeout-ms MS]
//
// Cases at level 3 in `HarnessScenarios` fail on purpose; they exercise the
// failure paths of the report. Run with `--level 0` or a filter to skip them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use acts_harness::{cli, Registry};
use thiserror::Error;

const CALLBACK_DELAY: Duration = Duration::from_millis(5);

#[derive(Debug, Error, Clone, PartialEq)]
enum StoreError {
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    fn code(&self) -> u32 {
        match self {
            StoreError::KeyNotFound(_) => 15100004,
            StoreError::Closed => 15100005,
        }
    }
}

/// Stands in for a distributed KV store: every call answers asynchronously,
/// either through a callback or a future.
#[derive(Default)]
struct StubKvStore {
    entries: HashMap<String, String>,
    open: bool,
}

type StoreHandle = Rc<RefCell<StubKvStore>>;

fn open_store() -> StoreHandle {
    Rc::new(RefCell::new(StubKvStore {
        entries: HashMap::new(),
        open: true,
    }))
}

fn put(
    store: &StoreHandle,
    key: &str,
    value: &str,
    callback: impl FnOnce(Result<(), StoreError>) + 'static,
) {
    let store = store.clone();
    let (key, value) = (key.to_string(), value.to_string());
    tokio::task::spawn_local(async move {
        tokio::time::sleep(CALLBACK_DELAY).await;
        let result = {
            let mut store = store.borrow_mut();
            if store.open {
                store.entries.insert(key, value);
                Ok(())
            } else {
                Err(StoreError::Closed)
            }
        };
        callback(result);
    });
}

async fn get(store: &StoreHandle, key: &str) -> Result<String, StoreError> {
    tokio::time::sleep(CALLBACK_DELAY).await;
    let store = store.borrow();
    if !store.open {
        return Err(StoreError::Closed);
    }
    store
        .entries
        .get(key)
        .cloned()
        .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
}

#[derive(Default)]
struct KvFixture {
    store: Option<StoreHandle>,
}

fn register(registry: &Registry) -> Result<(), acts_harness::HarnessError> {
    registry.describe("HarnessScenarios", |s| {
        s.it("c1", 0, |cx| {
            cx.expect(1 + 1).assert_equal(2);
            cx.done();
        });
        s.it("c2", 3, |cx| {
            cx.expect(1).assert_equal(2);
            cx.done();
        });
        s.it("c3", 3, |_cx| panic!("boom"));
        s.it("c4", 0, |cx| cx.done());
        s.it("c5", 3, |_cx| {});
    })?;

    registry.describe_with_state::<KvFixture, _>("KvStoreStub", |s| {
        s.before_all(|cx| {
            cx.with_state(|f| f.store = Some(open_store()));
            cx.done();
        });
        s.before_each_async(|cx| async move {
            let store = cx.with_state(|f| f.store.clone());
            match store {
                Some(store) => {
                    store.borrow_mut().entries.clear();
                    Ok(())
                }
                None => Err(StoreError::Closed),
            }
        });
        s.after_all(|cx| {
            if let Some(store) = cx.with_state(|f| f.store.take()) {
                store.borrow_mut().open = false;
            }
            cx.done();
        });

        s.it("put_callback_0100", 0, |cx| {
            let Some(store) = cx.with_state(|f| f.store.clone()) else {
                cx.expect(false).assert_true();
                cx.done();
                return;
            };
            let inner = cx.clone();
            let written = store.clone();
            put(&store, "k1", "v1", move |result| {
                inner.expect(result.is_ok()).assert_true();
                inner.expect(written.borrow().entries.len()).assert_equal(1);
                inner.done();
            });
        });

        s.it_async("get_promise_0200", 1, |cx| async move {
            let store = cx
                .with_state(|f| f.store.clone())
                .ok_or(StoreError::Closed)?;
            let (tx, rx) = tokio::sync::oneshot::channel();
            put(&store, "k2", "v2", move |result| {
                let _ = tx.send(result);
            });
            rx.await.map_err(|_| StoreError::Closed)??;
            let value = get(&store, "k2").await?;
            cx.expect(value).assert_equal("v2");
            Ok::<(), StoreError>(())
        });

        s.it_async("get_missing_key_0300", 1, |cx| async move {
            let store = cx
                .with_state(|f| f.store.clone())
                .ok_or(StoreError::Closed)?;
            match get(&store, "absent").await {
                Ok(value) => {
                    cx.expect(Some(value)).assert_null();
                }
                Err(e) => {
                    cx.expect(e.code()).assert_equal(15100004);
                    cx.expect(e.to_string()).assert_contain("absent");
                }
            }
            Ok::<(), StoreError>(())
        });

        s.it("entries_cleared_between_cases_0400", 2, |cx| {
            let len = cx.with_state(|f| f.store.as_ref().map(|s| s.borrow().entries.len()));
            cx.expect(len).assert_equal(Some(0));
            cx.done();
        });
    })?;

    Ok(())
}

fn main() -> ExitCode {
    let registry = Registry::new();
    if let Err(e) = register(&registry) {
        eprintln!("{:?}", miette::Report::new(e));
        return ExitCode::from(2);
    }
    cli::main_with(registry)
}
