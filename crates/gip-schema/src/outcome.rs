//! Validation results
//!
//! Invalidity is data: callers inspect [`ValidationOutcome::is_valid`] rather
//! than handle an error path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::document::ParseFailure;

/// Locator of the document root
pub const ROOT_PATH: &str = "$";

/// One localized mismatch between a document and a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted field locator (`$`, `operation`, `target.path`, `items[2]`)
    pub path: String,
    /// Human-readable description
    pub message: String,
    /// Required shape at that path
    pub expected: String,
}

impl Violation {
    /// Create violation
    #[inline]
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        message: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            expected: expected.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (expected {})", self.message, self.expected)
    }
}

/// Result of validating one document against one contract
///
/// `value` is populated exactly when the outcome is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OutcomeWire")]
pub struct ValidationOutcome {
    valid: bool,
    violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

impl ValidationOutcome {
    /// Outcome for a conforming document
    #[inline]
    #[must_use]
    pub fn success(value: Value) -> Self {
        Self {
            valid: true,
            violations: Vec::new(),
            value: Some(value),
        }
    }

    /// Outcome from collected violations
    ///
    /// An empty list means the document conforms.
    #[must_use]
    pub fn from_violations(value: Value, violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            Self::success(value)
        } else {
            Self {
                valid: false,
                violations,
                value: None,
            }
        }
    }

    /// Outcome for text that never became a document
    #[must_use]
    pub fn parse_failure(failure: &ParseFailure) -> Self {
        Self {
            valid: false,
            violations: vec![Violation::new(
                ROOT_PATH,
                failure.to_string(),
                "well-formed JSON document",
            )],
            value: None,
        }
    }

    /// Whether the document satisfied the contract
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Violations in declaration order, depth-first
    #[inline]
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Validated document (only when valid)
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Take the validated document
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        self.value
    }
}

#[derive(Deserialize)]
struct OutcomeWire {
    valid: bool,
    #[serde(default)]
    violations: Vec<Violation>,
    #[serde(default)]
    value: Option<Value>,
}

impl TryFrom<OutcomeWire> for ValidationOutcome {
    type Error = String;

    fn try_from(wire: OutcomeWire) -> Result<Self, Self::Error> {
        match (wire.valid, wire.violations.is_empty(), wire.value) {
            // a valid `null` document serializes as `"value": null`
            (true, true, value) => Ok(Self::success(value.unwrap_or(Value::Null))),
            (false, false, None) => Ok(Self {
                valid: false,
                violations: wire.violations,
                value: None,
            }),
            (true, false, _) => Err("valid outcome must not carry violations".into()),
            (false, true, _) => Err("invalid outcome must carry at least one violation".into()),
            (false, false, Some(_)) => Err("invalid outcome must not carry a value".into()),
        }
    }
}
