//! Structural validator
//!
//! Depth-first walk of a contract tree against a parsed document. Type checks
//! are closed-world (no coercion, `null` is its own kind) while field checks
//! are open-world (undeclared keys are ignored).
//!
//! Everything here is pure: no I/O, no shared state, inputs are borrowed
//! immutably, and the same inputs always produce the same outcome.

use serde_json::Value;

use crate::contract::{format_allowed, Contract, ScalarKind, SchemaNode};
use crate::document::DocumentParser;
use crate::outcome::{ValidationOutcome, Violation, ROOT_PATH};

/// Validate a parsed document against a contract
#[must_use]
pub fn validate(document: &Value, contract: &Contract) -> ValidationOutcome {
    let violations = validate_node(document, contract.root());
    ValidationOutcome::from_violations(document.clone(), violations)
}

/// Parse raw text with the default parser, then validate
///
/// Text that does not parse yields a single violation at `$`.
#[must_use]
pub fn validate_text(raw: &str, contract: &Contract) -> ValidationOutcome {
    DocumentParser::default().validate(raw, contract)
}

/// Collect violations of `document` against a bare node, rooted at `$`
#[must_use]
pub fn validate_node(document: &Value, node: &SchemaNode) -> Vec<Violation> {
    let mut violations = Vec::new();
    walk(document, node, ROOT_PATH, &mut violations);
    violations
}

impl DocumentParser {
    /// Parse raw text with this parser, then validate
    #[must_use]
    pub fn validate(&self, raw: &str, contract: &Contract) -> ValidationOutcome {
        match self.parse(raw) {
            Ok(document) => validate(&document, contract),
            Err(failure) => ValidationOutcome::parse_failure(&failure),
        }
    }
}

fn walk(value: &Value, node: &SchemaNode, path: &str, out: &mut Vec<Violation>) {
    match node {
        SchemaNode::Scalar(kind) => {
            if !scalar_matches(*kind, value) {
                out.push(type_violation(path, node, value));
            }
        }
        SchemaNode::Enumerated(allowed) => match value {
            Value::String(s) if allowed.contains(s.as_str()) => {}
            Value::String(_) => {
                let rendered = format_allowed(allowed);
                out.push(Violation::new(
                    path,
                    format!("invalid value at {path}: must be one of {rendered}"),
                    node.describe(),
                ));
            }
            _ => out.push(type_violation(path, node, value)),
        },
        SchemaNode::Structured(fields) => {
            let Value::Object(map) = value else {
                out.push(type_violation(path, node, value));
                return;
            };
            for (name, field) in fields {
                let field_path = child_path(path, name);
                match map.get(name) {
                    Some(child) => walk(child, &field.node, &field_path, out),
                    None if field.required => out.push(Violation::new(
                        field_path.as_str(),
                        format!("missing field {field_path}"),
                        field.node.describe(),
                    )),
                    None => {}
                }
            }
        }
        SchemaNode::Sequence(element) => {
            let Value::Array(items) = value else {
                out.push(type_violation(path, node, value));
                return;
            };
            for (index, item) in items.iter().enumerate() {
                walk(item, element, &format!("{path}[{index}]"), out);
            }
        }
    }
}

fn scalar_matches(kind: ScalarKind, value: &Value) -> bool {
    matches!(
        (kind, value),
        (ScalarKind::String, Value::String(_))
            | (ScalarKind::Number, Value::Number(_))
            | (ScalarKind::Boolean, Value::Bool(_))
            | (ScalarKind::Null, Value::Null)
    )
}

fn type_violation(path: &str, node: &SchemaNode, value: &Value) -> Violation {
    Violation::new(
        path,
        format!(
            "invalid type at {path}: expected {}, got {}",
            node.type_name(),
            json_type_name(value)
        ),
        node.describe(),
    )
}

fn child_path(parent: &str, field: &str) -> String {
    if parent == ROOT_PATH {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

/// JSON type name of a document value
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
