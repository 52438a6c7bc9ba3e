//! Step and teardown demo showing passing and failing paths.
//!
//! Run with: cargo run --example demo
//! Set BFT_DEBUG=1 to see the per-action dump on failure.

use std::cell::{Cell, RefCell};

use boardstep::{add_action, call_action, json, RetryPolicy, StepError, TestCase};
use thiserror::Error;

// ============================================================================
// Device manager and error types
// ============================================================================

#[derive(Debug, Default)]
struct Devices {
    wan_up: Cell<bool>,
    console: RefCell<Vec<String>>,
}

impl Devices {
    fn sendline(&self, line: &str) -> Result<String, DemoError> {
        self.console.borrow_mut().push(line.to_owned());
        match line {
            "ifup wan" => {
                self.wan_up.set(true);
                Ok("wan: link up".into())
            }
            "ifdown wan" => {
                self.wan_up.set(false);
                Ok("wan: link down".into())
            }
            "iptables -F" => Err(DemoError::Prompt("iptables".into())),
            other => Ok(format!("{other}: ok")),
        }
    }
}

#[derive(Debug, Clone, Error)]
enum DemoError {
    #[error("division by zero")]
    DivideByZero,
    #[error("prompt not seen after {0}")]
    Prompt(String),
}

// ============================================================================
// Actions
// ============================================================================

fn multiply(a: i64, m: i64) -> Result<i64, DemoError> {
    println!("\nAction multiply will return value: {}\n", a * m);
    Ok(a * m)
}

fn divide(a: i64, m: i64) -> Result<i64, DemoError> {
    let value = a.checked_div(m).ok_or(DemoError::DivideByZero)?;
    println!("\nAction divide will return value: {value}\n");
    Ok(value)
}

fn add_100(a: i64) -> Result<i64, DemoError> {
    println!("\nAction addition will return value: {}\n", a + 100);
    Ok(a + 100)
}

// ============================================================================
// Demo scenarios
// ============================================================================

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║           Boardstep Demo                                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let tc = TestCase::new("Demo", Devices::default());

    if let Err(err) = run_test(&tc) {
        println!("\n  ✗ Test failed: {err}\n");
    }
    run_teardown(&tc);

    println!("\n\nHow stuff will look like in the log buffer:\n{}", tc.log());
}

fn run_test(tc: &TestCase<Devices>) -> Result<(), StepError> {
    println!("┌──────────────────────────────────────────────────────────────┐");
    println!("│ Scenario 1: Queue two actions, verify both outputs           │");
    println!("└──────────────────────────────────────────────────────────────┘\n");

    tc.step_in("This is step1 of test setup", "Example 1").run(|ts| {
        add_action!(ts, multiply(2, 3));
        add_action!(ts, divide(6, 2));
        ts.add_verify(
            |r| r[0].output() == &json!(6) && r[1].output() == &json!(3),
            "verify step1 output",
        );
        ts.execute()
    })?;

    println!("┌──────────────────────────────────────────────────────────────┐");
    println!("│ Scenario 2: Execute repeatedly on one step                   │");
    println!("└──────────────────────────────────────────────────────────────┘\n");

    tc.step_in("This is step1 of execution", "Example 2").run(|ts| {
        for i in [1, 2, 3, 4] {
            add_action!(ts, add_100(i));
            ts.execute()?;
            let ok = ts.last_result().is_some_and(|r| r.output() == &json!(100 + i));
            ts.verify(ok, format!("Verification for input: {i}"))?;
        }
        Ok::<_, StepError>(())
    })?;

    println!("┌──────────────────────────────────────────────────────────────┐");
    println!("│ Scenario 3: Retry a flaky device call                        │");
    println!("└──────────────────────────────────────────────────────────────┘\n");

    let dev = tc.dev();
    let flaps = Cell::new(2);
    tc.step_in("bring the WAN up", "Example 3").run(|ts| {
        ts.call_retrying("ifup", RetryPolicy::retries_with_backoff(3, 50), || {
            if flaps.get() > 0 {
                flaps.set(flaps.get() - 1);
                return Err(DemoError::Prompt("ifup wan".into()));
            }
            dev.sendline("ifup wan")
        })?;
        let up = dev.wan_up.get();
        ts.verify(up, "WAN link is up")
    })?;

    println!("┌──────────────────────────────────────────────────────────────┐");
    println!("│ Scenario 4: A failing action aborts the step                 │");
    println!("└──────────────────────────────────────────────────────────────┘\n");

    tc.step_in("This is step2 of execution", "Example 4").run(|ts| {
        add_action!(ts, multiply(2, 3));
        add_action!(ts, divide(6, 0));
        ts.execute()?;
        ts.verify(ts.results()[1].output() != &json!(3), "verify step2 output")
    })
}

fn run_teardown(tc: &TestCase<Devices>) {
    println!("┌──────────────────────────────────────────────────────────────┐");
    println!("│ Scenario 5: Teardown keeps going after a failure             │");
    println!("└──────────────────────────────────────────────────────────────┘\n");

    let dev = tc.dev();
    let mut td = tc.teardown("restore the board");
    let steps = [
        td.call("flush_firewall", || dev.sendline("iptables -F")),
        call_action!(td, multiply(1, 1) => 2),
        td.call_expect("wan_down", || dev.sendline("ifdown wan"), "wan: link down"),
    ];
    td.exit(None);

    if steps.iter().any(Result::is_err) {
        println!("\n  ✗ Teardown script is broken\n");
    } else if td.cumulative_pass() {
        println!("\n  ✓ Teardown completed cleanly\n");
    } else {
        println!(
            "\n  ✗ Teardown completed with failures, console: {:?}\n",
            dev.console.borrow()
        );
    }
}
