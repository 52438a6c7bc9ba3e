//! Fail-soft teardown steps.
//!
//! Every action added to a [`TeardownStep`] is wrapped so its failure is
//! recorded as a [`ContOnFail`] marker instead of stopping the sequence:
//! cleanup must proceed as far as it can. Usage faults still propagate.

use std::fmt::Display;

use serde::Serialize;
use serde_json::Value;

use crate::action::{expected_value, Action, RetryPolicy};
use crate::error::StepError;
use crate::log::{self, LineStyle};
use crate::owner::StepOwner;
use crate::result::{ContOnFail, Output, StepResult};
use crate::step::Step;

/// A step whose actions never abort the sequence.
#[derive(Debug)]
pub struct TeardownStep<'a> {
    step: Step<'a>,
    cumulative_pass: bool,
    entered: bool,
}

impl<'a> TeardownStep<'a> {
    /// Create a teardown step and allocate its index within `section`.
    pub fn new(
        owner: &'a dyn StepOwner,
        description: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            step: Step::new(owner, description, section),
            cumulative_pass: true,
            entered: false,
        }
    }

    /// The underlying step, for read access.
    pub fn step(&self) -> &Step<'a> {
        &self.step
    }

    /// 1-based index within the section.
    pub fn index(&self) -> u32 {
        self.step.index()
    }

    /// Every result recorded so far.
    pub fn results(&self) -> &[StepResult] {
        self.step.results()
    }

    /// Most recent result.
    pub fn last_result(&self) -> Option<&StepResult> {
        self.step.last_result()
    }

    /// Returns `true` between scope entry and exit.
    pub fn is_open(&self) -> bool {
        self.step.is_open()
    }

    /// `false` once any teardown action has failed.
    pub fn cumulative_pass(&self) -> bool {
        self.cumulative_pass
    }

    /// Returns `true` once the start banner has been logged.
    pub fn entered(&self) -> bool {
        self.entered
    }

    /// Open the scope explicitly.
    pub fn enter(&mut self) -> &mut Self {
        self.entered = true;
        self.step.enter();
        self
    }

    /// Close the scope. The step is reported as failed if `failure` is set or
    /// any action failed.
    pub fn exit(&mut self, failure: Option<&dyn Display>) {
        match failure {
            Some(failure) => self.step.exit(Some(failure)),
            None if !self.cumulative_pass => {
                self.step.exit(Some(&"one or more teardown actions failed"))
            }
            None => self.step.exit(None),
        }
        self.entered = false;
    }

    /// Run `body` inside the scope.
    pub fn run<T, E, F>(&mut self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: Display,
    {
        self.enter();
        let outcome = body(self);
        match &outcome {
            Ok(_) => self.exit(None),
            Err(err) => self.exit(Some(err)),
        }
        outcome
    }

    /// Queue a cleanup action. Its failure is absorbed.
    pub fn add<T, E, F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: FnOnce() -> Result<T, E> + 'a,
        T: Serialize,
        E: Display + std::fmt::Debug + 'static,
    {
        self.step.push(Action::new(name, func).absorb_failures());
        self
    }

    /// Queue a retried cleanup action. Failure after the last retry is
    /// absorbed.
    pub fn add_retrying<T, E, F>(
        &mut self,
        name: impl Into<String>,
        policy: RetryPolicy,
        func: F,
    ) -> &mut Self
    where
        F: FnMut() -> Result<T, E> + 'a,
        T: Serialize,
        E: Display + std::fmt::Debug + 'static,
    {
        self.step
            .push(Action::with_retry(name, policy, func).absorb_failures());
        self
    }

    /// Queue one cleanup action and execute it, entering the scope if needed.
    pub fn call<T, E, F>(&mut self, name: impl Into<String>, func: F) -> Result<(), StepError>
    where
        F: FnOnce() -> Result<T, E> + 'a,
        T: Serialize,
        E: Display + std::fmt::Debug + 'static,
    {
        self.add(name, func);
        self.execute_expecting(None)
    }

    /// Like [`TeardownStep::call`], and record a failure if the output is not
    /// equal to `expected`. Values are compared in their JSON form.
    pub fn call_expect<T, E, F, X>(
        &mut self,
        name: impl Into<String>,
        func: F,
        expected: X,
    ) -> Result<(), StepError>
    where
        F: FnOnce() -> Result<T, E> + 'a,
        T: Serialize,
        E: Display + std::fmt::Debug + 'static,
        X: Serialize,
    {
        self.add(name, func);
        self.execute_expecting(Some(expected_value(&expected).map_err(|e| e.to_string())))
    }

    /// Execute every queued cleanup action, entering the scope if needed.
    ///
    /// Only usage faults are returned.
    pub fn execute(&mut self) -> Result<(), StepError> {
        self.execute_expecting(None)
    }

    /// Register a post-execution predicate. A false result marks the
    /// teardown as failed without aborting it.
    pub fn add_verify<F>(&mut self, predicate: F, message: impl Into<String>) -> &mut Self
    where
        F: FnMut(&[StepResult]) -> bool + 'a,
    {
        self.step.add_verify(predicate, message);
        self
    }

    /// Check `condition` and log the verdict. Returns the condition; a false
    /// condition clears [`TeardownStep::cumulative_pass`].
    pub fn verify(&mut self, condition: bool, message: impl Display) -> bool {
        if self.step.verify(condition, message).is_err() {
            self.cumulative_pass = false;
        }
        condition
    }

    fn ensure_entered(&mut self) {
        if !self.entered {
            self.enter();
        }
    }

    fn execute_expecting(
        &mut self,
        expected: Option<Result<Value, String>>,
    ) -> Result<(), StepError> {
        self.ensure_entered();
        let first = self.step.results().len();
        let outcome = self.step.execute();
        if let Err(err) = &outcome {
            if !err.is_usage() {
                self.cumulative_pass = false;
            }
        }
        if let Some(expected) = expected {
            self.check_expected(expected);
        }
        // Results recorded before a usage fault are still reported.
        for position in first..self.step.results().len() {
            self.report(position);
        }
        match outcome {
            Err(err) if err.is_usage() => Err(err),
            _ => Ok(()),
        }
    }

    fn check_expected(&mut self, expected: Result<Value, String>) {
        let Some(last) = self.step.results_mut().last_mut() else {
            return;
        };
        if last.output.is_continue_on_fail() {
            return;
        }
        let message = match expected {
            Ok(expected) if last.output == expected => return,
            Ok(expected) => format!(
                "Teardown Assertion FAIL :\nExp: {} Actual: {}",
                Output::Value(expected),
                last.output
            ),
            Err(reason) => format!("expected value not serializable: {reason}"),
        };
        last.output = Output::ContinueOnFail(ContOnFail::new(message));
    }

    fn report(&mut self, position: usize) {
        let Some(result) = self.step.results().get(position).cloned() else {
            return;
        };
        let owner = self.step.owner();
        let settings = owner.settings().clone();
        let number = position + 1;

        if let Some(marker) = result.output().as_continue_on_fail() {
            self.step.log(
                &format!(
                    "Teardown failed for Step {}.{}\n{} - Reason: {}",
                    self.step.index(),
                    number,
                    result.action_name(),
                    marker
                ),
                LineStyle::BLOCK,
            );
            self.cumulative_pass = false;
            if settings.debug {
                if let Some(detail) = &marker.detail {
                    self.step.log(detail, LineStyle::TRACE);
                }
            }
        }

        let verdict = if self.cumulative_pass { "PASS" } else { "FAIL" };
        self.step
            .log(&log::banner('-', settings.wrap_width), LineStyle::PLAIN);
        self.step.log(
            &format!(
                "[{}]:[{} Step {}.{}]\tResult: {}",
                owner.owner_name(),
                self.step.section(),
                self.step.index(),
                number,
                verdict
            ),
            LineStyle::EVENT,
        );
        self.step
            .log(&format!("Output: {}", result.output()), LineStyle::PLAIN);
        self.step
            .log(&log::banner('-', settings.wrap_width), LineStyle::PLAIN);

        #[cfg(feature = "tracing")]
        tracing::info!(
            run = %owner.run_id(),
            step = self.step.index(),
            action = number,
            result = verdict,
            "teardown.result"
        );
    }
}

impl Drop for TeardownStep<'_> {
    fn drop(&mut self) {
        if !self.step.is_open() {
            return;
        }
        if std::thread::panicking() {
            self.exit(Some(&"panicked inside teardown scope"));
        } else {
            self.exit(None);
        }
    }
}
