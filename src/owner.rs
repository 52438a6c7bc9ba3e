//! The test case that owns steps: its name, log buffer and step numbering.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Settings;
use crate::step::Step;
use crate::teardown::TeardownStep;

/// Section used by [`TestCase::step`].
pub const EXECUTION: &str = "Execution";

/// Section used by [`TestCase::teardown`].
pub const TEARDOWN: &str = "TearDown";

/// What a step needs from the test case that owns it.
pub trait StepOwner {
    /// Name printed in step tags, usually the test case type name.
    fn owner_name(&self) -> &str;

    /// Allocate the next 1-based step index for `section`.
    fn next_step_index(&self, section: &str) -> u32;

    /// Append text to the cumulative log buffer.
    fn append_log(&self, text: &str);

    /// Logging settings.
    fn settings(&self) -> &Settings;

    /// Identifier attached to structured events.
    fn run_id(&self) -> RunId {
        RunId::nil()
    }
}

/// Unique identifier for one test case instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero ID, for owners that do not track runs.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-section step counter.
///
/// Each section is numbered independently, starting at 1.
#[derive(Debug, Default)]
pub struct StepCounter {
    sections: Mutex<HashMap<String, u32>>,
}

impl StepCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the index for `section`.
    pub fn next(&self, section: &str) -> u32 {
        let mut sections = self.sections.lock();
        let count = sections.entry(section.to_owned()).or_insert(0);
        *count += 1;
        *count
    }

    /// Last index handed out for `section`, 0 if none.
    pub fn current(&self, section: &str) -> u32 {
        self.sections.lock().get(section).copied().unwrap_or(0)
    }
}

/// A test case instance: owns the device manager, the log buffer and the
/// step numbering for every step opened against it.
#[derive(Debug)]
pub struct TestCase<D = ()> {
    name: String,
    id: RunId,
    dev: D,
    log: Mutex<String>,
    counter: StepCounter,
    settings: Settings,
}

impl<D> TestCase<D> {
    /// Create a test case with settings taken from the environment.
    pub fn new(name: impl Into<String>, dev: D) -> Self {
        Self::with_settings(name, dev, Settings::from_env())
    }

    /// Create a test case with explicit settings.
    pub fn with_settings(name: impl Into<String>, dev: D, settings: Settings) -> Self {
        Self {
            name: name.into(),
            id: RunId::new(),
            dev,
            log: Mutex::new(String::new()),
            counter: StepCounter::new(),
            settings,
        }
    }

    /// Test case name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run identifier of this instance.
    pub fn id(&self) -> RunId {
        self.id
    }

    /// The device manager.
    pub fn dev(&self) -> &D {
        &self.dev
    }

    /// Snapshot of everything logged so far.
    pub fn log(&self) -> String {
        self.log.lock().clone()
    }

    /// Take the log buffer, leaving it empty.
    pub fn take_log(&self) -> String {
        std::mem::take(&mut *self.log.lock())
    }

    /// Step counter for this instance.
    pub fn counter(&self) -> &StepCounter {
        &self.counter
    }

    /// Open a new step in the `Execution` section.
    pub fn step(&self, description: impl Into<String>) -> Step<'_> {
        Step::new(self, description, EXECUTION)
    }

    /// Open a new step in an arbitrary section.
    pub fn step_in(&self, description: impl Into<String>, section: impl Into<String>) -> Step<'_> {
        Step::new(self, description, section)
    }

    /// Open a new teardown step in the `TearDown` section.
    pub fn teardown(&self, description: impl Into<String>) -> TeardownStep<'_> {
        TeardownStep::new(self, description, TEARDOWN)
    }

    /// Consume the test case and return the device manager.
    pub fn into_dev(self) -> D {
        self.dev
    }
}

impl<D> StepOwner for TestCase<D> {
    fn owner_name(&self) -> &str {
        &self.name
    }

    fn next_step_index(&self, section: &str) -> u32 {
        self.counter.next(section)
    }

    fn append_log(&self, text: &str) {
        self.log.lock().push_str(text);
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn run_id(&self) -> RunId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_sections_are_independent() {
        let counter = StepCounter::new();
        assert_eq!(counter.next(EXECUTION), 1);
        assert_eq!(counter.next(TEARDOWN), 1);
        assert_eq!(counter.next(EXECUTION), 2);
        assert_eq!(counter.current(EXECUTION), 2);
        assert_eq!(counter.current("Setup"), 0);
    }

    #[test]
    fn fresh_instances_restart_numbering() {
        let first = TestCase::with_settings("Probe", (), Settings::quiet());
        first.next_step_index(EXECUTION);
        first.next_step_index(EXECUTION);

        let second = TestCase::with_settings("Probe", (), Settings::quiet());
        assert_eq!(second.next_step_index(EXECUTION), 1);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn log_buffer_appends_and_takes() {
        let tc = TestCase::with_settings("Probe", 7u8, Settings::quiet());
        tc.append_log("a\r\n");
        tc.append_log("b\r\n");
        assert_eq!(tc.log(), "a\r\nb\r\n");
        assert_eq!(tc.take_log(), "a\r\nb\r\n");
        assert!(tc.log().is_empty());
        assert_eq!(*tc.dev(), 7);
    }
}
