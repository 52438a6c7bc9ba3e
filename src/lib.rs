#![deny(missing_docs)]

//! Boardstep — scoped test steps for hardware-in-the-loop device testing.
//!
//! # Design Goals
//!
//! - **Ordered, fail-fast steps**: actions run in insertion order and the
//!   first failure stops the pass
//! - **Fail-soft teardown**: every cleanup action runs, failures are recorded
//! - **Distinguishable faults**: a broken test script is never confused with a
//!   misbehaving device
//!
//! # Core Concepts
//!
//! - [`Step`]: a numbered, logged scope holding queued actions and results
//! - [`TeardownStep`]: a step whose action failures are absorbed
//! - [`TestCase`]: the owner of steps, with the device manager, the log
//!   buffer and per-section step numbering
//!
// Modules
pub mod action;
pub mod config;
pub mod error;
pub mod log;
mod macros;
pub mod owner;
pub mod result;
pub mod step;
pub mod teardown;

// Re-exports for convenience
pub use action::{Action, ActionFailure, Invocation, RetryPolicy};
pub use config::Settings;
pub use error::{FaultKind, StepError};
pub use owner::{RunId, StepCounter, StepOwner, TestCase, EXECUTION, TEARDOWN};
pub use result::{ContOnFail, Grade, Output, StepResult};
pub use serde_json::{json, Value};
pub use step::Step;
pub use teardown::TeardownStep;

#[cfg(test)]
mod tests;
