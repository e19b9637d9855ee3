//! JSON-Schema subset codec
//!
//! Contracts are usually authored in the JSON-Schema dialect that model
//! providers already understand for structured output:
//!
//! ```json
//! {
//!   "type": "object",
//!   "properties": {
//!     "operation": { "type": "string", "enum": ["read", "write"] },
//!     "path": { "type": "string" }
//!   },
//!   "required": ["operation", "path"]
//! }
//! ```
//!
//! Only the constructs the [`SchemaNode`] model can express are accepted.
//! Everything else (`$ref`, `integer`, `minimum`, `pattern`, `oneOf`, ...)
//! is rejected with the pointer of the offending node.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

use crate::contract::{escape_pointer, Contract, FieldSpec, ScalarKind, SchemaNode};
use crate::error::ContractError;

/// Keywords accepted anywhere and ignored
const ANNOTATIONS: &[&str] = &["description", "title", "$schema", "$comment"];

impl Contract {
    /// Build a contract from a JSON-Schema subset document
    ///
    /// # Errors
    /// Returns `ContractError` naming the first unsupported or malformed node.
    pub fn from_json_schema(name: impl Into<String>, schema: &Value) -> Result<Self, ContractError> {
        let root = node_from_json(schema, "#")?;
        let contract = Contract::new(name, root)?;
        Ok(
            match schema.get("description").and_then(Value::as_str) {
                Some(description) => contract.with_description(description),
                None => contract,
            },
        )
    }

    /// Render as JSON Schema (used as the structured-output hint for producers)
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut value = self.root().to_json_schema();
        if let Value::Object(map) = &mut value {
            map.insert("title".to_string(), Value::String(self.name().to_string()));
            if let Some(description) = self.description() {
                map.insert(
                    "description".to_string(),
                    Value::String(description.to_string()),
                );
            }
        }
        value
    }
}

impl SchemaNode {
    /// Render this node as JSON Schema
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut map = Map::new();
        match self {
            SchemaNode::Scalar(kind) => {
                map.insert("type".into(), Value::String(kind.as_str().into()));
            }
            SchemaNode::Enumerated(allowed) => {
                map.insert("type".into(), Value::String("string".into()));
                map.insert(
                    "enum".into(),
                    Value::Array(allowed.iter().cloned().map(Value::String).collect()),
                );
            }
            SchemaNode::Structured(fields) => {
                map.insert("type".into(), Value::String("object".into()));
                let properties: Map<String, Value> = fields
                    .iter()
                    .map(|(name, field)| (name.clone(), field.node.to_json_schema()))
                    .collect();
                map.insert("properties".into(), Value::Object(properties));
                let required: Vec<Value> = fields
                    .iter()
                    .filter(|(_, field)| field.required)
                    .map(|(name, _)| Value::String(name.clone()))
                    .collect();
                if !required.is_empty() {
                    map.insert("required".into(), Value::Array(required));
                }
            }
            SchemaNode::Sequence(element) => {
                map.insert("type".into(), Value::String("array".into()));
                map.insert("items".into(), element.to_json_schema());
            }
        }
        Value::Object(map)
    }
}

fn node_from_json(schema: &Value, pointer: &str) -> Result<SchemaNode, ContractError> {
    let Value::Object(map) = schema else {
        return Err(ContractError::malformed(pointer, "schema node must be an object"));
    };

    let declared_type = match map.get("type") {
        None => None,
        Some(Value::String(t)) => Some(t.as_str()),
        Some(_) => {
            return Err(ContractError::malformed(pointer, "'type' must be a single string"));
        }
    };

    if let Some(allowed) = map.get("enum") {
        check_keywords(map, pointer, &["type", "enum"])?;
        if let Some(t) = declared_type.filter(|t| *t != "string") {
            return Err(ContractError::UnsupportedType {
                pointer: pointer.to_string(),
                type_name: format!("enum of {t}"),
            });
        }
        return enum_from_json(allowed, pointer);
    }

    match declared_type {
        None => Err(ContractError::malformed(pointer, "missing 'type' or 'enum'")),
        Some("object") => {
            check_keywords(map, pointer, &["type", "properties", "required", "additionalProperties"])?;
            object_from_json(map, pointer)
        }
        Some("array") => {
            check_keywords(map, pointer, &["type", "items"])?;
            let items = map
                .get("items")
                .ok_or_else(|| ContractError::malformed(pointer, "array node requires 'items'"))?;
            let element = node_from_json(items, &format!("{pointer}/items"))?;
            Ok(SchemaNode::sequence(element))
        }
        Some(other) => {
            let kind = match other {
                "string" => ScalarKind::String,
                "number" => ScalarKind::Number,
                "boolean" => ScalarKind::Boolean,
                "null" => ScalarKind::Null,
                _ => {
                    return Err(ContractError::UnsupportedType {
                        pointer: pointer.to_string(),
                        type_name: other.to_string(),
                    })
                }
            };
            check_keywords(map, pointer, &["type"])?;
            Ok(SchemaNode::Scalar(kind))
        }
    }
}

fn object_from_json(map: &Map<String, Value>, pointer: &str) -> Result<SchemaNode, ContractError> {
    match map.get("additionalProperties") {
        None | Some(Value::Bool(true)) => {}
        Some(_) => {
            return Err(ContractError::UnsupportedKeyword {
                pointer: pointer.to_string(),
                keyword: "additionalProperties".to_string(),
            })
        }
    }

    let required: IndexSet<&str> = match map.get("required") {
        None => IndexSet::new(),
        Some(Value::Array(names)) => names
            .iter()
            .map(|n| {
                n.as_str().ok_or_else(|| {
                    ContractError::malformed(pointer, "'required' entries must be strings")
                })
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(ContractError::malformed(pointer, "'required' must be an array")),
    };

    let properties = match map.get("properties") {
        None => Map::new(),
        Some(Value::Object(properties)) => properties.clone(),
        Some(_) => return Err(ContractError::malformed(pointer, "'properties' must be an object")),
    };

    if let Some(undeclared) = required.iter().find(|name| !properties.contains_key(**name)) {
        return Err(ContractError::malformed(
            pointer,
            format!("required field '{undeclared}' is not declared in 'properties'"),
        ));
    }

    let mut fields = IndexMap::with_capacity(properties.len());
    for (name, child) in &properties {
        let child_pointer = format!("{pointer}/properties/{}", escape_pointer(name));
        let node = node_from_json(child, &child_pointer)?;
        let spec = if required.contains(name.as_str()) {
            FieldSpec::required(node)
        } else {
            FieldSpec::optional(node)
        };
        fields.insert(name.clone(), spec);
    }
    Ok(SchemaNode::Structured(fields))
}

fn enum_from_json(allowed: &Value, pointer: &str) -> Result<SchemaNode, ContractError> {
    let Value::Array(items) = allowed else {
        return Err(ContractError::malformed(pointer, "'enum' must be an array"));
    };
    if items.is_empty() {
        return Err(ContractError::malformed(pointer, "'enum' must not be empty"));
    }
    let literals = items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ContractError::malformed(pointer, "'enum' values must be strings"))
        })
        .collect::<Result<IndexSet<_>, _>>()?;
    Ok(SchemaNode::Enumerated(literals))
}

fn check_keywords(
    map: &Map<String, Value>,
    pointer: &str,
    allowed: &[&str],
) -> Result<(), ContractError> {
    match map
        .keys()
        .find(|k| !allowed.contains(&k.as_str()) && !ANNOTATIONS.contains(&k.as_str()))
    {
        Some(keyword) => Err(ContractError::UnsupportedKeyword {
            pointer: pointer.to_string(),
            keyword: keyword.clone(),
        }),
        None => Ok(()),
    }
}
