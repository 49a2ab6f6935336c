// The completion contract: done(), settled futures, panics, rejections and
// timeouts.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use acts_harness::{HarnessConfig, Outcome, Registry, RunReport, Runner};

fn run_with_timeout(registry: &Registry, timeout_ms: u64) -> RunReport {
    let config = HarnessConfig::default().with_timeout(Duration::from_millis(timeout_ms));
    Runner::new(config).unwrap().run(registry).unwrap()
}

fn failure_reason(report: &RunReport, suite: &str, case: &str) -> String {
    match report.outcome(suite, case) {
        Some(Outcome::Failed { reason }) => reason.clone(),
        other => panic!("expected {}::{} to fail, got {:?}", suite, case, other),
    }
}

#[test]
fn passing_assertion_then_done_passes() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it("c1", 0, |cx| {
                cx.expect(1 + 1).assert_equal(2);
                cx.done();
            });
        })
        .unwrap();

    let report = run_with_timeout(&registry, 100);

    assert_eq!(report.outcome("S", "c1"), Some(&Outcome::Passed));
    assert_eq!(report.case("S", "c1").unwrap().assertions, 1);
}

#[test]
fn mismatch_reports_expected_and_actual() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it("c2", 0, |cx| {
                cx.expect(1).assert_equal(2);
                cx.done();
            });
        })
        .unwrap();

    let reason = failure_reason(&run_with_timeout(&registry, 100), "S", "c2");

    assert!(reason.contains("expected 2"), "{}", reason);
    assert!(reason.contains("actual 1"), "{}", reason);
}

#[test]
fn first_failure_sticks_through_later_passing_assertions() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it("sticky", 0, |cx| {
                cx.expect("a").assert_equal("b");
                cx.expect(true).assert_true();
                cx.expect(3).assert_less(4);
                cx.expect(false).assert_true();
                cx.done();
            });
        })
        .unwrap();

    let report = run_with_timeout(&registry, 100);
    let case = report.case("S", "sticky").unwrap();

    assert!(failure_reason(&report, "S", "sticky").starts_with("assert_equal failed"));
    assert_eq!(case.diagnostics.len(), 2);
    assert_eq!(case.assertions, 4);
}

#[test]
fn panic_fails_the_case_and_later_cases_still_run() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it("c3", 0, |_cx| panic!("boom"));
            s.it("after", 0, |cx| cx.done());
        })
        .unwrap();

    let report = run_with_timeout(&registry, 100);

    assert!(failure_reason(&report, "S", "c3").contains("boom"));
    assert_eq!(report.outcome("S", "after"), Some(&Outcome::Passed));
}

#[test]
fn missing_done_times_out_and_neighbours_are_reported() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it("c4", 0, |cx| cx.done());
            s.it("c5", 0, |_cx| {});
        })
        .unwrap();

    let report = run_with_timeout(&registry, 50);

    assert_eq!(report.outcome("S", "c4"), Some(&Outcome::Passed));
    assert_eq!(
        report.outcome("S", "c5"),
        Some(&Outcome::TimedOut { after_ms: 50 })
    );
    assert_eq!(report.failed_paths(), vec!["S::c5".to_string()]);
}

#[test]
fn late_done_and_assertions_after_timeout_are_ignored() {
    let fired = Rc::new(Cell::new(false));
    let registry = Registry::new();
    let late = fired.clone();
    registry
        .describe("S", move |s| {
            s.it("slow", 0, move |cx| {
                let late = late.clone();
                tokio::task::spawn_local(async move {
                    tokio::time::sleep(Duration::from_millis(120)).await;
                    cx.expect(1).assert_equal(2);
                    cx.done();
                    late.set(true);
                });
            });
        })
        .unwrap();
    // Keeps the runtime busy long enough for the late task to fire.
    registry
        .describe("Waiting", |s| {
            s.timeout(Duration::from_millis(1_000));
            s.it_async("sleeps", 0, |cx| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                cx.expect(true).assert_true();
            });
        })
        .unwrap();

    let report = run_with_timeout(&registry, 50);
    let slow = report.case("S", "slow").unwrap();

    assert!(fired.get(), "the late task never ran");
    assert_eq!(slow.outcome, Outcome::TimedOut { after_ms: 50 });
    assert_eq!(slow.diagnostics, vec!["timed out after 50ms".to_string()]);
    assert_eq!(slow.assertions, 0);
    assert_eq!(report.outcome("Waiting", "sleeps"), Some(&Outcome::Passed));
}

#[test]
fn done_from_a_spawned_callback_completes_the_case() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it("callback", 0, |cx| {
                let done = cx.done_handle();
                let inner = cx.clone();
                tokio::task::spawn_local(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inner.expect(vec!["k1", "k2"]).assert_contain("k2");
                    done.complete();
                });
            });
        })
        .unwrap();

    let report = run_with_timeout(&registry, 500);

    assert_eq!(report.outcome("S", "callback"), Some(&Outcome::Passed));
    assert_eq!(report.case("S", "callback").unwrap().assertions, 1);
}

#[test]
fn async_case_completes_when_its_future_settles() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it_async("settles", 0, |cx| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                cx.expect(0.5f32).assert_close(0.5, 1e-6);
            });
        })
        .unwrap();

    let report = run_with_timeout(&registry, 500);

    assert_eq!(report.outcome("S", "settles"), Some(&Outcome::Passed));
}

#[test]
fn done_wins_over_a_future_that_never_settles() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it_async("done_first", 0, |cx| async move {
                cx.done();
                futures::future::pending::<()>().await;
            });
        })
        .unwrap();

    let report = run_with_timeout(&registry, 500);

    assert_eq!(report.outcome("S", "done_first"), Some(&Outcome::Passed));
}

#[test]
fn rejected_future_fails_with_its_error() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it_async("rejects", 0, |_cx| async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Err::<(), String>("permission denied: 201".to_string())
            });
            s.it_async::<_, _, ()>("panics", 0, |_cx| async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                panic!("async boom");
            });
        })
        .unwrap();

    let report = run_with_timeout(&registry, 500);

    assert_eq!(failure_reason(&report, "S", "rejects"), "permission denied: 201");
    assert_eq!(failure_reason(&report, "S", "panics"), "panicked: async boom");
}

#[test]
fn done_fail_records_the_reason() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it("done_fail", 0, |cx| cx.done_handle().fail("callback returned err 401"));
        })
        .unwrap();

    let report = run_with_timeout(&registry, 100);

    assert_eq!(failure_reason(&report, "S", "done_fail"), "callback returned err 401");
}

#[test]
fn suite_timeout_overrides_the_configured_one() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.timeout(Duration::from_millis(20));
            s.it("hangs", 0, |_cx| {});
        })
        .unwrap();

    let report = run_with_timeout(&registry, 5_000);

    assert_eq!(
        report.outcome("S", "hangs"),
        Some(&Outcome::TimedOut { after_ms: 20 })
    );
}

#[test]
fn assert_fail_marks_the_case_failed_but_the_body_continues() {
    let registry = Registry::new();
    registry
        .describe("S", |s| {
            s.it("continues", 0, |cx| {
                cx.expect(()).assert_fail();
                cx.expect(None::<u8>).assert_undefined();
                cx.done();
            });
        })
        .unwrap();

    let report = run_with_timeout(&registry, 100);
    let case = report.case("S", "continues").unwrap();

    assert_eq!(case.outcome, Outcome::failed("assert_fail reached"));
    assert_eq!(case.assertions, 2);
}
