//! Fault kinds surfaced by steps.
//!
//! Callers must be able to tell a broken test script (usage fault) apart from
//! a device or environment that did not behave (test failure).

use serde::{Deserialize, Serialize};

/// Classification of a [`StepError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// The test script used the step API incorrectly.
    Usage,
    /// An action failed or a verification did not hold.
    TestFailure,
}

/// Errors returned from step execution.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// `execute` was called while the step scope was not open.
    #[error("{tag} - need to execute step inside an open scope")]
    NotOpen {
        /// `[Owner]:[Section Step n]` tag of the step.
        tag: String,
    },

    /// `execute` was called with nothing queued.
    #[error("{tag} - no actions added before calling execute")]
    NoActions {
        /// `[Owner]:[Section Step n]` tag of the step.
        tag: String,
    },

    /// The verification predicate itself failed.
    #[error("{tag}::[Verification] :\n{message}")]
    VerifyPredicate {
        /// `[Owner]:[Section Step n]` tag of the step.
        tag: String,
        /// Error or panic message produced by the predicate.
        message: String,
    },

    /// A queued action returned an error or panicked.
    #[error("{label} : FAIL :: {kind}:{message}")]
    ActionFailed {
        /// Full action label, `[Owner]:[Section Step n.a]::[name]`.
        label: String,
        /// Short type name of the error, or `panic`.
        kind: String,
        /// Stringified error.
        message: String,
    },

    /// A verification condition was false.
    #[error("{tag}::[Verification] :\n{message} - FAILED")]
    VerificationFailed {
        /// `[Owner]:[Section Step n]` tag of the step.
        tag: String,
        /// Verification message supplied by the caller.
        message: String,
    },
}

impl StepError {
    /// Which fault category this error belongs to.
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::NotOpen { .. } | Self::NoActions { .. } | Self::VerifyPredicate { .. } => {
                FaultKind::Usage
            }
            Self::ActionFailed { .. } | Self::VerificationFailed { .. } => FaultKind::TestFailure,
        }
    }

    /// Returns `true` for programming errors in the test script.
    pub fn is_usage(&self) -> bool {
        self.kind() == FaultKind::Usage
    }

    /// Returns `true` for device/environment failures.
    pub fn is_test_failure(&self) -> bool {
        self.kind() == FaultKind::TestFailure
    }
}
