//! Dispatch results
//!
//! Every dispatch call ends in an [`ActionOutcome`]. Failures carry a stable
//! [`ErrorCode`] so callers can branch without parsing messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No action registered under the identifier
    ActionNotFound,
    /// No execution context could be resolved
    ContextMissing,
    /// Permission predicate rejected the context
    PermissionDenied,
    /// Parameters failed the action's input contract
    InvalidParameters,
    /// Handler returned an error or panicked
    ExecutionError,
}

impl ErrorCode {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ActionNotFound => "ACTION_NOT_FOUND",
            ErrorCode::ContextMissing => "CONTEXT_MISSING",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::InvalidParameters => "INVALID_PARAMETERS",
            ErrorCode::ExecutionError => "EXECUTION_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure payload of an outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionError {
    /// Classification
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Structured diagnostics (violations, handler details)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ActionError {
    /// Create action error
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// With details
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Result of one dispatch call
///
/// Serialized as `{"success": true, "data": ...}` or
/// `{"success": false, "error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OutcomeWire", try_from = "OutcomeWire")]
pub enum ActionOutcome {
    /// Handler completed
    Success {
        /// Handler result
        data: Value,
    },
    /// Dispatch stopped before or during the handler
    Failure {
        /// What went wrong
        error: ActionError,
    },
}

impl ActionOutcome {
    /// Successful outcome
    #[inline]
    #[must_use]
    pub fn success(data: Value) -> Self {
        ActionOutcome::Success { data }
    }

    /// Failed outcome
    #[must_use]
    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        ActionOutcome::Failure {
            error: ActionError::new(code, message),
        }
    }

    /// Did the handler complete?
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Success { .. })
    }

    /// Handler result, when successful
    #[inline]
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            ActionOutcome::Success { data } => Some(data),
            ActionOutcome::Failure { .. } => None,
        }
    }

    /// Failure payload, when failed
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&ActionError> {
        match self {
            ActionOutcome::Success { .. } => None,
            ActionOutcome::Failure { error } => Some(error),
        }
    }

    /// Failure code, when failed
    #[inline]
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        self.error().map(|e| e.code)
    }
}

impl From<ActionError> for ActionOutcome {
    fn from(error: ActionError) -> Self {
        ActionOutcome::Failure { error }
    }
}

#[derive(Serialize, Deserialize)]
struct OutcomeWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ActionError>,
}

impl From<ActionOutcome> for OutcomeWire {
    fn from(outcome: ActionOutcome) -> Self {
        match outcome {
            ActionOutcome::Success { data } => OutcomeWire {
                success: true,
                data: Some(data),
                error: None,
            },
            ActionOutcome::Failure { error } => OutcomeWire {
                success: false,
                data: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<OutcomeWire> for ActionOutcome {
    type Error = String;

    fn try_from(wire: OutcomeWire) -> Result<Self, Self::Error> {
        match (wire.success, wire.data, wire.error) {
            (true, data, None) => Ok(ActionOutcome::Success {
                data: data.unwrap_or(Value::Null),
            }),
            (false, None, Some(error)) => Ok(ActionOutcome::Failure { error }),
            (true, _, Some(_)) => Err("successful outcome must not carry an error".into()),
            (false, Some(_), _) => Err("failed outcome must not carry data".into()),
            (false, None, None) => Err("failed outcome must carry an error".into()),
        }
    }
}
