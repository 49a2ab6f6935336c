//! `expect(value)` and its matchers.
//!
//! Matchers never panic and never stop the body. A matcher that does not hold
//! appends a diagnostic to the invocation's assertion record and returns
//! `false`, so a body that wants to stop early can do so explicitly:
//!
//! ```rust,no_run
//! # use acts_harness::Context;
//! # fn body(cx: Context) {
//! if !cx.expect(Some(3)).assert_null() {
//!     cx.done();
//!     return;
//! }
//! # }
//! ```

use std::any::{type_name, TypeId};
use std::fmt::Debug;

use difference::{Changeset, Difference};
use serde::Serialize;
use tracing::debug;

use crate::outcome::SharedRecord;

pub struct Expect<T> {
    actual: T,
    record: SharedRecord,
}

impl<T> Expect<T> {
    pub(crate) fn new(actual: T, record: SharedRecord) -> Self {
        Self { actual, record }
    }

    pub fn actual(&self) -> &T {
        &self.actual
    }

    /// Fails unconditionally.
    pub fn assert_fail(self) -> bool {
        self.report(false, || "assert_fail reached".to_string())
    }

    fn report(&self, held: bool, diagnostic: impl FnOnce() -> String) -> bool {
        let mut record = self.record.borrow_mut();
        if record.is_closed() {
            debug!(target: "acts::expect", held, "assertion after invocation settled ignored");
            return held;
        }
        if held {
            record.pass();
        } else {
            record.fail(diagnostic());
        }
        held
    }
}

// =============================================================================
// EQUALITY AND ORDERING
// =============================================================================

impl<T: Debug> Expect<T> {
    pub fn assert_equal<U: Debug>(self, expected: U) -> bool
    where
        T: PartialEq<U>,
    {
        let held = self.actual == expected;
        self.report(held, || {
            format!(
                "assert_equal failed: expected {:?}, actual {:?}",
                expected, self.actual
            )
        })
    }

    pub fn assert_larger<U: Debug>(self, bound: U) -> bool
    where
        T: PartialOrd<U>,
    {
        let held = self.actual > bound;
        self.report(held, || {
            format!(
                "assert_larger failed: expected a value larger than {:?}, actual {:?}",
                bound, self.actual
            )
        })
    }

    pub fn assert_less<U: Debug>(self, bound: U) -> bool
    where
        T: PartialOrd<U>,
    {
        let held = self.actual < bound;
        self.report(held, || {
            format!(
                "assert_less failed: expected a value less than {:?}, actual {:?}",
                bound, self.actual
            )
        })
    }

    pub fn assert_contain<N: Debug>(self, needle: N) -> bool
    where
        T: Contains<N>,
    {
        let held = self.actual.contains_item(&needle);
        self.report(held, || {
            format!(
                "assert_contain failed: {:?} does not contain {:?}",
                self.actual, needle
            )
        })
    }
}

impl<T: Serialize> Expect<T> {
    /// Structural equality: both sides must serialize to the same JSON tree.
    pub fn assert_deep_equal<U: Serialize + ?Sized>(self, expected: &U) -> bool {
        let compared = serde_json::to_value(&self.actual)
            .and_then(|actual| Ok((actual, serde_json::to_value(expected)?)));
        match compared {
            Ok((actual, expected)) => {
                let held = actual == expected;
                self.report(held, || deep_equal_diagnostic(&expected, &actual))
            }
            Err(e) => self.report(false, || {
                format!("assert_deep_equal failed: values are not comparable: {}", e)
            }),
        }
    }
}

fn deep_equal_diagnostic(expected: &serde_json::Value, actual: &serde_json::Value) -> String {
    let expected = serde_json::to_string_pretty(expected).unwrap_or_else(|_| expected.to_string());
    let actual = serde_json::to_string_pretty(actual).unwrap_or_else(|_| actual.to_string());
    let changeset = Changeset::new(&expected, &actual, "\n");
    let mut out = String::from("assert_deep_equal failed: (- expected, + actual)");
    for diff in &changeset.diffs {
        let (prefix, chunk) = match diff {
            Difference::Same(x) => (' ', x),
            Difference::Rem(x) => ('-', x),
            Difference::Add(x) => ('+', x),
        };
        for line in chunk.lines() {
            out.push('\n');
            out.push(prefix);
            out.push_str(line);
        }
    }
    out
}

// =============================================================================
// TRUTHINESS AND ABSENCE
// =============================================================================

impl Expect<bool> {
    pub fn assert_true(self) -> bool {
        let held = self.actual;
        self.report(held, || "assert_true failed: actual false".to_string())
    }

    pub fn assert_false(self) -> bool {
        let held = !self.actual;
        self.report(held, || "assert_false failed: actual true".to_string())
    }
}

impl<U: Debug> Expect<Option<U>> {
    pub fn assert_null(self) -> bool {
        let held = self.actual.is_none();
        self.report(held, || {
            format!("assert_null failed: actual {:?}", self.actual)
        })
    }

    /// Same check as [`Expect::assert_null`]; both absent states map to `None`.
    pub fn assert_undefined(self) -> bool {
        let held = self.actual.is_none();
        self.report(held, || {
            format!("assert_undefined failed: actual {:?}", self.actual)
        })
    }
}

// =============================================================================
// NUMERIC AND TYPE CHECKS
// =============================================================================

impl<T: Into<f64> + Copy> Expect<T> {
    pub fn assert_close(self, expected: f64, tolerance: f64) -> bool {
        let actual: f64 = self.actual.into();
        let held = (actual - expected).abs() <= tolerance;
        self.report(held, || {
            format!(
                "assert_close failed: expected {} (+/- {}), actual {}",
                expected, tolerance, actual
            )
        })
    }
}

impl<T: 'static> Expect<T> {
    pub fn assert_instance_of<U: 'static>(self) -> bool {
        let held = TypeId::of::<T>() == TypeId::of::<U>();
        self.report(held, || {
            format!(
                "assert_instance_of failed: expected {}, actual {}",
                type_name::<U>(),
                type_name::<T>()
            )
        })
    }
}

// =============================================================================
// CONTAINMENT
// =============================================================================

/// Containment used by [`Expect::assert_contain`].
pub trait Contains<N> {
    fn contains_item(&self, needle: &N) -> bool;
}

impl<'a> Contains<&'a str> for String {
    fn contains_item(&self, needle: &&'a str) -> bool {
        self.contains(*needle)
    }
}

impl<'a, 'b> Contains<&'a str> for &'b str {
    fn contains_item(&self, needle: &&'a str) -> bool {
        self.contains(*needle)
    }
}

impl Contains<String> for String {
    fn contains_item(&self, needle: &String) -> bool {
        self.contains(needle.as_str())
    }
}

impl<U: PartialEq> Contains<U> for Vec<U> {
    fn contains_item(&self, needle: &U) -> bool {
        self.contains(needle)
    }
}

impl<'b, U: PartialEq> Contains<U> for &'b [U] {
    fn contains_item(&self, needle: &U) -> bool {
        self.contains(needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::AssertionRecord;

    fn expect<T>(actual: T) -> (Expect<T>, SharedRecord) {
        let record = AssertionRecord::shared();
        (Expect::new(actual, record.clone()), record)
    }

    #[test]
    fn equal_mismatch_names_both_values() {
        let (e, record) = expect(1);
        assert!(!e.assert_equal(2));
        let record = record.borrow();
        let msg = record.first_failure().unwrap();
        assert!(msg.contains("expected 2"), "{}", msg);
        assert!(msg.contains("actual 1"), "{}", msg);
    }

    #[test]
    fn false_matcher_reports_the_true_value() {
        let (e, _) = expect(1 > 2);
        assert!(e.assert_false());
        let (e, record) = expect(2 > 1);
        assert!(!e.assert_false());
        assert_eq!(
            record.borrow().first_failure(),
            Some("assert_false failed: actual true")
        );
    }

    #[test]
    fn deep_equal_renders_line_diff() {
        #[derive(Serialize)]
        struct Entry {
            key: &'static str,
            value: u32,
        }
        let (e, record) = expect(Entry { key: "k1", value: 1 });
        assert!(!e.assert_deep_equal(&serde_json::json!({ "key": "k1", "value": 2 })));
        let record = record.borrow();
        let msg = record.first_failure().unwrap();
        assert!(msg.lines().any(|l| l.starts_with('-') && l.contains("2")), "{}", msg);
        assert!(msg.lines().any(|l| l.starts_with('+') && l.contains("1")), "{}", msg);
    }

    #[test]
    fn containment_over_strings_and_vectors() {
        let (e, _) = expect(String::from("0:1: L0001: Typename expected"));
        assert!(e.assert_contain("Typename"));
        let (e, _) = expect(vec![1, 2, 3]);
        assert!(e.assert_contain(2));
        let (e, record) = expect(vec![1, 2, 3]);
        assert!(!e.assert_contain(7));
        assert_eq!(record.borrow().failures().len(), 1);
    }

    #[test]
    fn close_and_instance_of() {
        let (e, _) = expect(0.1f32);
        assert!(e.assert_close(0.1, 1e-6));
        let (e, _) = expect(String::new());
        assert!(e.assert_instance_of::<String>());
        let (e, record) = expect(3u8);
        assert!(!e.assert_instance_of::<String>());
        assert!(record.borrow().first_failure().unwrap().contains("u8"));
    }
}
