// End-to-end runs of the `acts-selftest` binary.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use std::env;
use std::fs;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn selftest() -> Command {
    let mut cmd = Command::cargo_bin("acts-selftest").unwrap();
    cmd.arg("--color").arg("never");
    cmd
}

#[test]
fn level_zero_run_passes() {
    selftest()
        .args(["--level", "0", "--timeout-ms", "200"])
        .assert()
        .success()
        .stdout(contains("PASS c1").and(contains("PASS put_callback_0100")))
        .stdout(contains("SKIP c2"))
        .stdout(contains("Failed tests:").not());
}

#[test]
fn full_run_reports_every_intentional_failure() {
    selftest()
        .args(["--timeout-ms", "200"])
        .env("RUST_BACKTRACE", "1")
        .assert()
        .code(1)
        .stdout(contains("expected 2, actual 1"))
        .stdout(contains("panicked: boom"))
        .stdout(contains("TIME c5 (timed out after 200ms)"))
        .stdout(contains("  - HarnessScenarios::c2"))
        .stdout(contains("  - HarnessScenarios::c3"))
        .stdout(contains("  - HarnessScenarios::c5"))
        .stdout(contains("PASS get_promise_0200"))
        .stderr(contains("panicked at").not());
}

#[test]
fn json_output_for_the_kv_suite() {
    let output = selftest()
        .args(["--filter", "^KvStoreStub::", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let suites = report["suites"].as_array().unwrap();
    assert_eq!(suites.len(), 2);
    assert_eq!(suites[1]["name"], "KvStoreStub");
    for case in suites[1]["cases"].as_array().unwrap() {
        assert_eq!(case["outcome"]["status"], "passed", "{}", case);
    }
    for case in suites[0]["cases"].as_array().unwrap() {
        assert_eq!(case["outcome"]["status"], "skipped", "{}", case);
    }
}

#[test]
fn list_prints_cases_without_running_them() {
    selftest()
        .arg("--list")
        .assert()
        .success()
        .stdout(contains("HarnessScenarios::c5 [level 3]"))
        .stdout(contains("KvStoreStub::get_promise_0200 [level 1]"))
        .stdout(contains("Test summary").not());
}

#[test]
fn list_honours_filter_and_level() {
    selftest()
        .args(["--list", "--filter", "^KvStoreStub::", "--level", "1"])
        .assert()
        .success()
        .stdout(contains("KvStoreStub::get_promise_0200 [level 1]"))
        .stdout(contains("KvStoreStub::get_missing_key_0300 [level 1]"))
        .stdout(contains("put_callback_0100").not())
        .stdout(contains("HarnessScenarios").not());
}

#[test]
fn config_file_values_apply_and_flags_override_them() {
    let path = env::temp_dir().join(format!("acts-selftest-{}.yaml", std::process::id()));
    fs::write(&path, "level: 3\ntimeout_ms: 100\n").unwrap();

    let assert = selftest()
        .arg("--config")
        .arg(&path)
        .args(["--level", "0"])
        .assert();

    let _ = fs::remove_file(&path);
    assert.success().stdout(contains("SKIP c5"));
}

#[test]
fn invalid_filter_is_a_harness_error() {
    selftest()
        .args(["--filter", "("])
        .assert()
        .code(2)
        .stderr(contains("invalid case filter"));
}

#[test]
fn unknown_config_key_is_a_harness_error() {
    let path = env::temp_dir().join(format!("acts-selftest-bad-{}.yaml", std::process::id()));
    fs::write(&path, "timeout: 100\n").unwrap();

    let assert = selftest().arg("--config").arg(&path).assert();

    let _ = fs::remove_file(&path);
    assert
        .code(2)
        .stderr(contains("failed to parse configuration"));
}
