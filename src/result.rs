//! Per-action results recorded by a step.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Grade of one executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    /// The action returned normally.
    #[serde(rename = "OK")]
    Ok,
    /// The action failed.
    #[serde(rename = "FAIL")]
    Fail,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Fail => "FAIL",
        })
    }
}

/// Marker stored as the output of a teardown action that failed.
///
/// It is never returned as an error; callers inspect it through
/// [`Output::is_continue_on_fail`] or [`TeardownStep::cumulative_pass`].
///
/// [`TeardownStep::cumulative_pass`]: crate::TeardownStep::cumulative_pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContOnFail {
    /// Failure message.
    pub message: String,
    /// `Debug` rendering of the underlying error, when one exists.
    pub detail: Option<String>,
}

impl ContOnFail {
    /// Marker with a message and no further detail.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }
}

impl std::fmt::Display for ContOnFail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Output of an executed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Output {
    /// Value returned by a successful action.
    Value(Value),
    /// Stringified error of a failed action.
    Error(String),
    /// Absorbed teardown failure.
    ContinueOnFail(ContOnFail),
}

impl Output {
    /// The returned value, if the action succeeded.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `true` if this is an absorbed teardown failure.
    pub fn is_continue_on_fail(&self) -> bool {
        matches!(self, Self::ContinueOnFail(_))
    }

    /// The teardown failure marker, if any.
    pub fn as_continue_on_fail(&self) -> Option<&ContOnFail> {
        match self {
            Self::ContinueOnFail(c) => Some(c),
            _ => None,
        }
    }
}

impl PartialEq<Value> for Output {
    fn eq(&self, other: &Value) -> bool {
        self.value() == Some(other)
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(Value::String(s)) => f.write_str(s),
            Self::Value(Value::Null) => f.write_str("None"),
            Self::Value(v) => write!(f, "{v}"),
            Self::Error(e) => f.write_str(e),
            Self::ContinueOnFail(c) => write!(f, "{c}"),
        }
    }
}

/// Outcome of one executed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub(crate) label: String,
    pub(crate) grade: Grade,
    pub(crate) message: String,
    pub(crate) action: String,
    pub(crate) output: Output,
    pub(crate) attempts: u32,
    pub(crate) duration_ms: u64,
}

impl StepResult {
    /// `[Owner]:[Section Step s.a]::[name]`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// OK or FAIL.
    pub fn grade(&self) -> Grade {
        self.grade
    }

    /// Empty on success, the stringified error on failure.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the action that produced this result.
    pub fn action_name(&self) -> &str {
        &self.action
    }

    /// What the action produced.
    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Number of invocations, more than one only for retried actions.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wall time spent in the action, over all attempts.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Returns `true` if the grade is OK and the output is not a teardown
    /// failure marker.
    pub fn passed(&self) -> bool {
        self.grade == Grade::Ok && !self.output.is_continue_on_fail()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn output_compares_with_json() {
        let out = Output::Value(json!(6));
        assert!(out == json!(6));
        assert!(out != json!(3));
        assert!(Output::Error("6".into()) != json!(6));
    }

    #[test]
    fn output_display() {
        assert_eq!(Output::Value(json!("up")).to_string(), "up");
        assert_eq!(Output::Value(json!(3.5)).to_string(), "3.5");
        assert_eq!(Output::Value(Value::Null).to_string(), "None");
        assert_eq!(
            Output::ContinueOnFail(ContOnFail::new("link down")).to_string(),
            "link down"
        );
    }

    #[test]
    fn grade_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Grade::Fail).expect("serialize"), "\"FAIL\"");
    }
}
