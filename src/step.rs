//! Scoped test steps.
//!
//! A [`Step`] groups one or more deferred actions under a numbered,
//! logged scope. Actions run strictly in insertion order; the first failure
//! stops the pass. An optional verification predicate runs after a pass in
//! which every action succeeded.
//!
//! ```no_run
//! use boardstep::{json, Settings, StepError, TestCase};
//!
//! let tc = TestCase::with_settings("WifiBasic", (), Settings::quiet());
//! tc.step("associate and check").run(|ts| {
//!     ts.add("associate", || Ok::<_, String>("ssid-5g"));
//!     ts.add_verify(|r| r[0].output() == &json!("ssid-5g"), "associated");
//!     ts.execute()
//! })?;
//! # Ok::<(), StepError>(())
//! ```

use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;

use crate::action::{panic_message, Action, RetryPolicy};
use crate::error::StepError;
use crate::log::{self, LineStyle};
use crate::owner::StepOwner;
use crate::result::{Grade, Output, StepResult};

type Predicate<'a> = Box<dyn FnMut(&[StepResult]) -> Result<bool, String> + 'a>;

struct Verification<'a> {
    predicate: Predicate<'a>,
    message: String,
}

/// One logical phase of a test.
pub struct Step<'a> {
    owner: &'a dyn StepOwner,
    description: String,
    section: String,
    index: u32,
    tag: String,
    pending: Vec<Action<'a>>,
    results: Vec<StepResult>,
    verification: Option<Verification<'a>>,
    action_index: u32,
    open: bool,
    last_failure: Option<StepError>,
}

impl std::fmt::Debug for Step<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("tag", &self.tag)
            .field("description", &self.description)
            .field("pending", &self.pending)
            .field("results", &self.results)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl<'a> Step<'a> {
    /// Create a step and allocate its index within `section`.
    ///
    /// The scope is not open yet; see [`Step::enter`] and [`Step::run`].
    pub fn new(
        owner: &'a dyn StepOwner,
        description: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        let section = section.into();
        let index = owner.next_step_index(&section);
        let tag = format!("[{}]:[{} Step {}]", owner.owner_name(), section, index);
        Self {
            owner,
            description: description.into(),
            section,
            index,
            tag,
            pending: Vec::new(),
            results: Vec::new(),
            verification: None,
            action_index: 1,
            open: false,
            last_failure: None,
        }
    }

    /// 1-based index of this step within its section.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Section label, e.g. `Execution`.
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Free-text description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// `[Owner]:[Section Step n]`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns `true` between scope entry and exit.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of queued, not yet executed actions.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Every result recorded so far, in execution order.
    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    /// Result at `index`, if recorded.
    pub fn result(&self, index: usize) -> Option<&StepResult> {
        self.results.get(index)
    }

    /// Most recent result.
    pub fn last_result(&self) -> Option<&StepResult> {
        self.results.last()
    }

    /// Result log as pretty-printed JSON.
    pub fn results_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.results)
    }

    /// Open the scope and log the start banner.
    pub fn enter(&mut self) -> &mut Self {
        let width = self.owner.settings().wrap_width;
        self.log(&log::banner('#', width), LineStyle::PLAIN);
        self.log(&format!("{}: START", self.tag), LineStyle::EVENT);
        self.log(
            &format!("Description: {}", self.description),
            LineStyle::EVENT,
        );
        self.log(&log::banner('#', width), LineStyle::PLAIN);
        self.open = true;
        self.last_failure = None;

        #[cfg(feature = "tracing")]
        tracing::info!(
            run = %self.owner.run_id(),
            owner = self.owner.owner_name(),
            section = %self.section,
            step = self.index,
            "step.start"
        );
        self
    }

    /// Close the scope, logging PASS when `failure` is `None` and FAIL with
    /// the failure text otherwise.
    pub fn exit(&mut self, failure: Option<&dyn Display>) {
        let settings = self.owner.settings().clone();
        let verdict = if failure.is_some() { "FAIL" } else { "PASS" };
        self.log(&log::banner('-', settings.wrap_width), LineStyle::PLAIN);
        self.log(
            &format!("{}: END\t\tResult: {}", self.tag, verdict),
            LineStyle::EVENT,
        );
        if let Some(failure) = failure {
            self.log(failure.to_string().trim(), LineStyle::TRACE);
        }
        self.log(&log::banner('-', settings.wrap_width), LineStyle::PLAIN);
        if failure.is_some() && settings.debug {
            self.log(&self.output_dump(), LineStyle::BLOCK);
            self.log(&log::banner('-', settings.wrap_width), LineStyle::PLAIN);
        }
        self.open = false;

        #[cfg(feature = "tracing")]
        tracing::info!(
            run = %self.owner.run_id(),
            section = %self.section,
            step = self.index,
            result = verdict,
            "step.end"
        );
    }

    /// Run `body` inside the scope. The exit banner is always logged, with
    /// FAIL if `body` returned an error.
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

    /// Queue an action. Nothing runs until [`Step::execute`].
    pub fn add<T, E, F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: FnOnce() -> Result<T, E> + 'a,
        T: Serialize,
        E: Display + std::fmt::Debug + 'static,
    {
        self.push(Action::new(name, func))
    }

    /// Queue an action that is retried according to `policy`.
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
        self.push(Action::with_retry(name, policy, func))
    }

    /// Queue a prepared action.
    pub fn push(&mut self, action: Action<'a>) -> &mut Self {
        self.pending.push(action);
        self
    }

    /// Queue one action and execute immediately.
    pub fn call<T, E, F>(&mut self, name: impl Into<String>, func: F) -> Result<(), StepError>
    where
        F: FnOnce() -> Result<T, E> + 'a,
        T: Serialize,
        E: Display + std::fmt::Debug + 'static,
    {
        self.add(name, func);
        self.execute()
    }

    /// Queue one retried action and execute immediately.
    pub fn call_retrying<T, E, F>(
        &mut self,
        name: impl Into<String>,
        policy: RetryPolicy,
        func: F,
    ) -> Result<(), StepError>
    where
        F: FnMut() -> Result<T, E> + 'a,
        T: Serialize,
        E: Display + std::fmt::Debug + 'static,
    {
        self.add_retrying(name, policy, func);
        self.execute()
    }

    /// Register the predicate checked after every fully successful pass.
    ///
    /// The predicate sees the whole result log. A panicking predicate is a
    /// usage fault, not a verification failure.
    pub fn add_verify<F>(&mut self, mut predicate: F, message: impl Into<String>) -> &mut Self
    where
        F: FnMut(&[StepResult]) -> bool + 'a,
    {
        self.verification = Some(Verification {
            predicate: Box::new(move |results: &[StepResult]| Ok(predicate(results))),
            message: message.into(),
        });
        self
    }

    /// Like [`Step::add_verify`], for predicates that can fail. An error from
    /// the predicate is a usage fault.
    pub fn try_add_verify<F, E>(&mut self, mut predicate: F, message: impl Into<String>) -> &mut Self
    where
        F: FnMut(&[StepResult]) -> Result<bool, E> + 'a,
        E: Display,
    {
        self.verification = Some(Verification {
            predicate: Box::new(move |results: &[StepResult]| {
                predicate(results).map_err(|e| e.to_string())
            }),
            message: message.into(),
        });
        self
    }

    /// Run every queued action in order, then the verification predicate.
    ///
    /// The queue is empty when this returns, whatever the outcome.
    pub fn execute(&mut self) -> Result<(), StepError> {
        let pending = std::mem::take(&mut self.pending);
        if !self.open {
            return Err(self.usage(StepError::NotOpen {
                tag: self.tag.clone(),
            }));
        }
        if pending.is_empty() {
            return Err(self.usage(StepError::NoActions {
                tag: self.tag.clone(),
            }));
        }

        for action in pending {
            let name = action.name().to_owned();
            let label = format!(
                "[{}]:[{} Step {}.{}]::[{}]",
                self.owner.owner_name(),
                self.section,
                self.index,
                self.action_index,
                name
            );
            let invocation = action.invoke();
            self.action_index += 1;
            let duration_ms = invocation.duration.as_millis() as u64;

            match invocation.outcome {
                Ok(output) => {
                    self.log(&format!("{label} : DONE"), LineStyle::EVENT);
                    #[cfg(feature = "tracing")]
                    tracing::debug!(label = %label, duration_ms, "action.done");
                    self.results.push(StepResult {
                        label,
                        grade: Grade::Ok,
                        message: String::new(),
                        action: name,
                        output,
                        attempts: invocation.attempts,
                        duration_ms,
                    });
                }
                Err(failure) => {
                    self.log(
                        &format!("{label} : FAIL :: {}:{}", failure.kind, failure.message),
                        LineStyle::EVENT,
                    );
                    if self.owner.settings().debug {
                        self.log(&failure.detail, LineStyle::TRACE);
                    }
                    #[cfg(feature = "tracing")]
                    tracing::warn!(label = %label, kind = %failure.kind, error = %failure.message, "action.fail");
                    self.results.push(StepResult {
                        label: label.clone(),
                        grade: Grade::Fail,
                        message: failure.message.clone(),
                        action: name,
                        output: Output::Error(failure.message.clone()),
                        attempts: invocation.attempts,
                        duration_ms,
                    });
                    let err = StepError::ActionFailed {
                        label,
                        kind: failure.kind,
                        message: failure.message,
                    };
                    self.last_failure = Some(err.clone());
                    return Err(err);
                }
            }
        }

        self.run_verification()
    }

    /// Log PASSED when `condition` holds, otherwise log FAILED and return a
    /// test failure carrying `message`.
    pub fn verify(&mut self, condition: bool, message: impl Display) -> Result<(), StepError> {
        let verdict = if condition { "PASSED" } else { "FAILED" };
        self.log(
            &format!("{}::[Verification] :\n{} - {}", self.tag, message, verdict),
            LineStyle::EVENT,
        );
        #[cfg(feature = "tracing")]
        tracing::info!(step = %self.tag, passed = condition, "verify");
        if condition {
            return Ok(());
        }
        let err = StepError::VerificationFailed {
            tag: self.tag.clone(),
            message: message.to_string(),
        };
        self.last_failure = Some(err.clone());
        Err(err)
    }

    fn run_verification(&mut self) -> Result<(), StepError> {
        let Some(verification) = self.verification.as_mut() else {
            return Ok(());
        };
        let message = verification.message.clone();
        let predicate = &mut verification.predicate;
        let results = &self.results;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (*predicate)(results)));
        match outcome {
            Ok(Ok(condition)) => self.verify(condition, message),
            Ok(Err(reason)) => Err(self.predicate_fault(reason)),
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                Err(self.predicate_fault(reason))
            }
        }
    }

    fn predicate_fault(&mut self, message: String) -> StepError {
        self.usage(StepError::VerifyPredicate {
            tag: self.tag.clone(),
            message,
        })
    }

    fn usage(&mut self, err: StepError) -> StepError {
        #[cfg(feature = "tracing")]
        tracing::error!(step = %self.tag, error = %err, "step.usage");
        self.last_failure = Some(err.clone());
        err
    }

    fn output_dump(&self) -> String {
        let mut lines = vec!["Logging step output:".to_owned()];
        lines.extend(
            self.results
                .iter()
                .map(|r| format!("[{}] :: {}", r.action_name(), r.output())),
        );
        lines.join("\n")
    }

    pub(crate) fn owner(&self) -> &'a dyn StepOwner {
        self.owner
    }

    pub(crate) fn results_mut(&mut self) -> &mut Vec<StepResult> {
        &mut self.results
    }

    pub(crate) fn log(&self, msg: &str, style: LineStyle) {
        log::emit(self.owner, msg, style);
    }
}

impl Drop for Step<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if std::thread::panicking() {
            self.exit(Some(&"panicked inside step scope"));
        } else if let Some(err) = self.last_failure.take() {
            self.exit(Some(&err));
        } else {
            self.exit(None);
        }
    }
}
