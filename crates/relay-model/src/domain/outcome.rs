use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one script run as seen by the waiting request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Script finished; the return value may be absent.
    Success(Option<Value>),
    /// Script reported a failure; the message is passed through verbatim.
    Error(String),
}

impl Outcome {
    pub fn success(value: impl Into<Value>) -> Self {
        Outcome::Success(Some(value.into()))
    }

    pub fn empty() -> Self {
        Outcome::Success(None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Outcome::Error(message.into())
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

/// Wire shape of a script outcome.
///
/// The executor reports results in this form and the HTTP response body uses it too:
/// `{"returnValue": ...}` on success, `{"error": "..."}` on failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A non-empty `error` wins over any return value.
impl From<ScriptResult> for Outcome {
    fn from(result: ScriptResult) -> Self {
        match result.error {
            Some(message) if !message.is_empty() => Outcome::Error(message),
            _ => Outcome::Success(result.return_value),
        }
    }
}

impl From<Outcome> for ScriptResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success(return_value) => ScriptResult {
                return_value,
                error: None,
            },
            Outcome::Error(message) => ScriptResult {
                return_value: None,
                error: Some(message),
            },
        }
    }
}
