//! Contract model
//!
//! A contract is plain data: a named tree of [`SchemaNode`]s. Nodes own their
//! children, so a contract graph cannot contain a cycle and its depth is
//! exactly the nesting written at construction time.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ContractError;

/// Scalar kinds a document leaf may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    /// JSON string
    String,
    /// JSON number (integer or float)
    Number,
    /// JSON boolean
    Boolean,
    /// JSON null
    Null,
}

impl ScalarKind {
    /// Name used in messages and JSON-Schema output
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Number => "number",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Null => "null",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field of a structured node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Shape of the field value
    pub node: SchemaNode,
    /// Whether the field must be present
    pub required: bool,
}

impl FieldSpec {
    /// Required field
    #[inline]
    #[must_use]
    pub fn required(node: SchemaNode) -> Self {
        Self {
            node,
            required: true,
        }
    }

    /// Optional field
    #[inline]
    #[must_use]
    pub fn optional(node: SchemaNode) -> Self {
        Self {
            node,
            required: false,
        }
    }
}

/// One node of a contract tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec", rename_all = "snake_case")]
pub enum SchemaNode {
    /// Single typed leaf
    Scalar(ScalarKind),

    /// String drawn from a closed set of literals (declaration order kept)
    Enumerated(IndexSet<String>),

    /// Object with declared fields; undeclared keys are ignored
    Structured(IndexMap<String, FieldSpec>),

    /// List whose every element matches the inner node
    Sequence(Box<SchemaNode>),
}

impl SchemaNode {
    /// String leaf
    #[inline]
    #[must_use]
    pub fn string() -> Self {
        Self::Scalar(ScalarKind::String)
    }

    /// Number leaf
    #[inline]
    #[must_use]
    pub fn number() -> Self {
        Self::Scalar(ScalarKind::Number)
    }

    /// Boolean leaf
    #[inline]
    #[must_use]
    pub fn boolean() -> Self {
        Self::Scalar(ScalarKind::Boolean)
    }

    /// Null leaf
    #[inline]
    #[must_use]
    pub fn null() -> Self {
        Self::Scalar(ScalarKind::Null)
    }

    /// Enumeration of allowed string literals
    ///
    /// Duplicates collapse; the first occurrence fixes the position.
    #[must_use]
    pub fn enumeration<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enumerated(allowed.into_iter().map(Into::into).collect())
    }

    /// List of `element`
    #[inline]
    #[must_use]
    pub fn sequence(element: SchemaNode) -> Self {
        Self::Sequence(Box::new(element))
    }

    /// JSON type this node requires of a document value
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaNode::Scalar(kind) => kind.as_str(),
            SchemaNode::Enumerated(_) => "string",
            SchemaNode::Structured(_) => "object",
            SchemaNode::Sequence(_) => "array",
        }
    }

    /// Human-readable description of the required shape
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            SchemaNode::Scalar(kind) => kind.as_str().to_string(),
            SchemaNode::Enumerated(allowed) => format!("one of {}", format_allowed(allowed)),
            SchemaNode::Structured(_) => "object".to_string(),
            SchemaNode::Sequence(element) => format!("array of {}", element.describe()),
        }
    }

    /// Nesting depth (a leaf is 1)
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            SchemaNode::Scalar(_) | SchemaNode::Enumerated(_) => 1,
            SchemaNode::Structured(fields) => {
                1 + fields.values().map(|f| f.node.depth()).max().unwrap_or(0)
            }
            SchemaNode::Sequence(element) => 1 + element.depth(),
        }
    }
}

/// Render an allowed set as `[a, b, c]`
pub(crate) fn format_allowed(allowed: &IndexSet<String>) -> String {
    let items: Vec<&str> = allowed.iter().map(String::as_str).collect();
    format!("[{}]", items.join(", "))
}

/// Builder for structured nodes
///
/// Field order is the order of the builder calls and is the order in which
/// violations are reported.
#[derive(Debug, Default, Clone)]
pub struct ObjectBuilder {
    fields: IndexMap<String, FieldSpec>,
}

impl ObjectBuilder {
    /// Create empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add required field
    #[must_use]
    pub fn required(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.fields.insert(name.into(), FieldSpec::required(node));
        self
    }

    /// Add optional field
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.fields.insert(name.into(), FieldSpec::optional(node));
        self
    }

    /// Finish the node
    #[inline]
    #[must_use]
    pub fn build(self) -> SchemaNode {
        SchemaNode::Structured(self.fields)
    }
}

/// Named, immutable structural contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ContractWire")]
pub struct Contract {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    root: SchemaNode,
}

impl Contract {
    /// Create a contract
    ///
    /// # Errors
    /// - `ContractError::EmptyName` if `name` is blank
    /// - `ContractError::Malformed` for an empty enumeration or an empty
    ///   field name anywhere in `root`
    pub fn new(name: impl Into<String>, root: SchemaNode) -> Result<Self, ContractError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ContractError::EmptyName);
        }
        check_node(&root, "#")?;
        Ok(Self {
            name,
            description: None,
            root,
        })
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Contract name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional description
    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Root node
    #[inline]
    #[must_use]
    pub fn root(&self) -> &SchemaNode {
        &self.root
    }
}

/// Reject nodes no document could satisfy or address
fn check_node(node: &SchemaNode, pointer: &str) -> Result<(), ContractError> {
    match node {
        SchemaNode::Scalar(_) => Ok(()),
        SchemaNode::Enumerated(allowed) if allowed.is_empty() => {
            Err(ContractError::malformed(pointer, "'enum' must not be empty"))
        }
        SchemaNode::Enumerated(_) => Ok(()),
        SchemaNode::Structured(fields) => fields.iter().try_for_each(|(name, field)| {
            if name.is_empty() {
                return Err(ContractError::malformed(pointer, "field name must not be empty"));
            }
            check_node(&field.node, &format!("{pointer}/properties/{}", escape_pointer(name)))
        }),
        SchemaNode::Sequence(element) => check_node(element, &format!("{pointer}/items")),
    }
}

/// RFC 6901 escaping for pointer segments
pub(crate) fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Serialized form; decoding goes through [`Contract::new`]
#[derive(Deserialize)]
struct ContractWire {
    name: String,
    #[serde(default)]
    description: Option<String>,
    root: SchemaNode,
}

impl TryFrom<ContractWire> for Contract {
    type Error = ContractError;

    fn try_from(wire: ContractWire) -> Result<Self, Self::Error> {
        let contract = Contract::new(wire.name, wire.root)?;
        Ok(match wire.description {
            Some(description) => contract.with_description(description),
            None => contract,
        })
    }
}
