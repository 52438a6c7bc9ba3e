//! Usage fault tests.
//!
//! Misuse of the step API is reported as a usage fault, never as a test
//! failure, and never absorbed by teardown steps.

use std::cell::Cell;

use crate::{FaultKind, StepError};

use super::common::{divide, multiply, test_case, DeviceError};

/// Test that execute outside an open scope is a usage fault and runs nothing.
#[test]
fn execute_without_scope() {
    let tc = test_case("Usage");
    let ran = Cell::new(false);
    let mut ts = tc.step("not entered");
    ts.add("probe", || {
        ran.set(true);
        Ok::<_, DeviceError>(())
    });

    let err = ts.execute().expect_err("scope is closed");
    assert_eq!(err.kind(), FaultKind::Usage);
    assert!(matches!(err, StepError::NotOpen { .. }));
    assert!(!ran.get());
    assert_eq!(ts.pending_len(), 0);
    assert!(ts.results().is_empty());
}

/// Test that execute after the scope closed is a usage fault.
#[test]
fn execute_after_exit() {
    let tc = test_case("Usage");
    let mut ts = tc.step("closed again");
    ts.run(|ts| ts.call("multiply", || multiply(1, 1)))
        .expect("first pass");

    ts.add("multiply", || multiply(2, 2));
    let err = ts.execute().expect_err("scope is closed");
    assert!(err.is_usage());
}

/// Test that execute with nothing queued is a usage fault.
#[test]
fn execute_with_empty_queue() {
    let tc = test_case("Usage");
    let mut ts = tc.step("empty");
    ts.enter();

    let err = ts.execute().expect_err("nothing queued");
    assert_eq!(
        err,
        StepError::NoActions {
            tag: "[Usage]:[Execution Step 1]".into()
        }
    );
    assert!(err.is_usage());
}

/// Test that a panicking predicate is a usage fault, not a verification
/// failure.
#[test]
fn panicking_predicate_is_usage_fault() {
    let tc = test_case("Usage");
    let mut ts = tc.step("bad predicate");
    ts.enter();
    ts.add("multiply", || multiply(2, 3));
    ts.add_verify(|r| r[5].output().is_continue_on_fail(), "index out of range");

    let err = ts.execute().expect_err("predicate panics");
    assert!(matches!(err, StepError::VerifyPredicate { .. }));
    assert!(err.is_usage());
    assert_eq!(ts.results().len(), 1);
}

/// Test that an erroring predicate is a usage fault.
#[test]
fn erroring_predicate_is_usage_fault() {
    let tc = test_case("Usage");
    let mut ts = tc.step("fallible predicate");
    ts.enter();
    ts.add("multiply", || multiply(2, 3));
    ts.try_add_verify(
        |r| {
            r.first()
                .and_then(|r| r.output().value())
                .and_then(|v| v.as_str())
                .map(|s| s == "6")
                .ok_or("output is not a string")
        },
        "string output",
    );

    let err = ts.execute().expect_err("predicate errors");
    match err {
        StepError::VerifyPredicate { message, .. } => {
            assert_eq!(message, "output is not a string");
        }
        other => panic!("expected VerifyPredicate, got {other:?}"),
    }
}

/// Test that teardown steps do not absorb usage faults.
#[test]
fn teardown_propagates_usage_fault() {
    let tc = test_case("Usage");
    let mut td = tc.teardown("empty teardown");

    let err = td.execute().expect_err("nothing queued");
    assert!(err.is_usage());
    assert!(td.cumulative_pass());
}

/// Test that a broken teardown predicate is still a usage fault, and that
/// the actions of that pass are reported before it propagates.
///
/// Verifies:
/// - The predicate fault is returned
/// - The absorbed failure from the same pass clears `cumulative_pass`
/// - Both actions get their report lines
#[test]
fn teardown_propagates_predicate_fault() {
    let tc = test_case("Usage");
    let mut td = tc.teardown("bad predicate");
    td.add("divide", || divide(1, 0));
    td.add("multiply", || multiply(1, 1));
    td.add_verify(|r| r[9].passed(), "out of range");

    let err = td.execute().expect_err("predicate panics");
    assert!(matches!(err, StepError::VerifyPredicate { .. }));
    assert!(td.results()[0].output().is_continue_on_fail());
    assert!(!td.cumulative_pass());

    let log = tc.log();
    assert!(log.contains("Teardown failed for Step 1.1\ndivide - Reason: division by zero"));
    assert!(log.contains("[Usage]:[TearDown Step 1.2]\tResult: FAIL"));
}
