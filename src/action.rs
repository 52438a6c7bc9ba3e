//! Deferred actions queued inside a step.
//!
//! An [`Action`] is a named, zero-argument closure. All arguments are bound
//! when the closure is built; the step invokes it later with nothing.

use std::any::Any;
use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::{ContOnFail, Output};

/// How often a device action is re-sent before its failure counts.
///
/// Serial consoles and links drop the occasional prompt; a policy lets an
/// action absorb that without hiding a device that stays silent. Only the
/// final attempt is recorded, together with the number of invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// Send once.
    #[default]
    NoRetry,
    /// Re-send after a failure, at most `max_attempts` extra times.
    Retry {
        /// Extra invocations after the first one.
        max_attempts: u8,
        /// Pause before each re-send, in milliseconds.
        backoff_ms: u64,
    },
}

impl RetryPolicy {
    /// Re-send immediately, up to `max_attempts` times.
    pub const fn retries(max_attempts: u8) -> Self {
        Self::Retry {
            max_attempts,
            backoff_ms: 0,
        }
    }

    /// Re-send up to `max_attempts` times, pausing `backoff_ms` first.
    pub const fn retries_with_backoff(max_attempts: u8, backoff_ms: u64) -> Self {
        Self::Retry {
            max_attempts,
            backoff_ms,
        }
    }

    /// Whether a failed action may be re-sent once `retries_done` re-sends
    /// have already happened.
    pub fn should_retry(&self, retries_done: u8) -> bool {
        match self {
            Self::NoRetry => false,
            Self::Retry { max_attempts, .. } => retries_done < *max_attempts,
        }
    }

    /// Pause before a re-send, in milliseconds.
    pub fn backoff_ms(&self) -> u64 {
        match self {
            Self::NoRetry => 0,
            Self::Retry { backoff_ms, .. } => *backoff_ms,
        }
    }
}

/// Why an action did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    /// Short type name of the error, or `panic`.
    pub kind: String,
    /// `Display` rendering of the error.
    pub message: String,
    /// `Debug` rendering of the error.
    pub detail: String,
}

impl ActionFailure {
    fn from_error<E>(err: &E) -> Self
    where
        E: std::fmt::Display + std::fmt::Debug + 'static,
    {
        Self {
            kind: error_kind(err).to_owned(),
            message: err.to_string(),
            detail: format!("{err:?}"),
        }
    }

    fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = panic_message(payload.as_ref());
        Self {
            kind: "panic".to_owned(),
            detail: message.clone(),
            message,
        }
    }
}

/// Result of running an action, including how many times it was invoked.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Output on success, failure otherwise.
    pub outcome: Result<Output, ActionFailure>,
    /// Number of invocations made.
    pub attempts: u32,
    /// Total wall time.
    pub duration: Duration,
}

type Thunk<'a> = Box<dyn FnOnce() -> (Result<Output, ActionFailure>, u32) + 'a>;

/// A named deferred invocation.
pub struct Action<'a> {
    name: String,
    thunk: Thunk<'a>,
}

impl std::fmt::Debug for Action<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<'a> Action<'a> {
    /// Wrap a fallible closure. Panics are captured as failures.
    pub fn new<T, E, F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + 'a,
        T: Serialize,
        E: std::fmt::Display + std::fmt::Debug + 'static,
    {
        Self {
            name: name.into(),
            thunk: Box::new(move || (attempt(func), 1)),
        }
    }

    /// Wrap a closure that is re-invoked until it succeeds or `policy` is
    /// exhausted.
    pub fn with_retry<T, E, F>(name: impl Into<String>, policy: RetryPolicy, mut func: F) -> Self
    where
        F: FnMut() -> Result<T, E> + 'a,
        T: Serialize,
        E: std::fmt::Display + std::fmt::Debug + 'static,
    {
        let name = name.into();
        let action_name = name.clone();
        let thunk = move || {
            let mut retries: u8 = 0;
            loop {
                let outcome = attempt(&mut func);
                match outcome {
                    Err(failure) if policy.should_retry(retries) => {
                        retries += 1;
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            action = %action_name,
                            retry = retries,
                            error = %failure.message,
                            "action.retry"
                        );
                        #[cfg(not(feature = "tracing"))]
                        let _ = (&action_name, failure);
                        let backoff = policy.backoff_ms();
                        if backoff > 0 {
                            std::thread::sleep(Duration::from_millis(backoff));
                        }
                    }
                    outcome => return (outcome, u32::from(retries) + 1),
                }
            }
        };
        Self {
            name,
            thunk: Box::new(thunk),
        }
    }

    /// Convert any failure of this action into a [`ContOnFail`] output, so the
    /// action always succeeds.
    pub fn absorb_failures(self) -> Self {
        let Self { name, thunk } = self;
        let wrapped = move || {
            let (outcome, attempts) = thunk();
            let outcome = outcome.or_else(|failure| {
                Ok(Output::ContinueOnFail(ContOnFail {
                    message: failure.message,
                    detail: Some(failure.detail),
                }))
            });
            (outcome, attempts)
        };
        Self {
            name,
            thunk: Box::new(wrapped),
        }
    }

    /// Name of the wrapped callable.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the action, consuming it.
    pub fn invoke(self) -> Invocation {
        let started = Instant::now();
        let (outcome, attempts) = (self.thunk)();
        Invocation {
            outcome,
            attempts,
            duration: started.elapsed(),
        }
    }
}

/// Invoke `func` once, capturing errors, panics and unserializable outputs.
fn attempt<T, E, F>(func: F) -> Result<Output, ActionFailure>
where
    F: FnOnce() -> Result<T, E>,
    T: Serialize,
    E: std::fmt::Display + std::fmt::Debug + 'static,
{
    match panic::catch_unwind(AssertUnwindSafe(func)) {
        Ok(Ok(value)) => to_output(&value),
        Ok(Err(err)) => Err(ActionFailure::from_error(&err)),
        Err(payload) => Err(ActionFailure::from_panic(payload)),
    }
}

fn to_output<T: Serialize>(value: &T) -> Result<Output, ActionFailure> {
    serde_json::to_value(value)
        .map(Output::Value)
        .map_err(|err| ActionFailure::from_error(&err))
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Kind reported for a failed action.
///
/// Boxed trait objects carry no useful static name, so the boxed error is
/// matched against common concrete types first.
fn error_kind<E: 'static>(err: &E) -> &'static str {
    let any: &dyn Any = err;
    let boxed: &(dyn StdError + 'static) =
        if let Some(b) = any.downcast_ref::<Box<dyn StdError + Send + Sync>>() {
            &**b
        } else if let Some(b) = any.downcast_ref::<Box<dyn StdError + Send>>() {
            &**b
        } else if let Some(b) = any.downcast_ref::<Box<dyn StdError>>() {
            &**b
        } else {
            return short_type_name::<E>();
        };
    boxed_kind(boxed)
}

fn boxed_kind(err: &(dyn StdError + 'static)) -> &'static str {
    macro_rules! known {
        ($($ty:ty),* $(,)?) => {
            $(
                if err.is::<$ty>() {
                    return short_type_name::<$ty>();
                }
            )*
        };
    }
    known!(
        std::io::Error,
        std::fmt::Error,
        serde_json::Error,
        std::num::ParseIntError,
        std::num::ParseFloatError,
        std::str::Utf8Error,
        std::string::FromUtf8Error,
    );
    "dyn Error"
}

/// JSON form of an expected value for teardown comparisons.
pub(crate) fn expected_value<T: Serialize>(value: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(value)
}
