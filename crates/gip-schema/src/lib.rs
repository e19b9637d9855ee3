//! GIP Schema - structural contracts for model-produced documents
//!
//! Contracts are data: a named tree of scalar, enumerated, structured and
//! sequence nodes. The validator walks that tree against a parsed document
//! and reports every mismatch as a [`Violation`], never as an error.
//!
//! # Example
//!
//! ```rust
//! use gip_schema::{validate, Contract, ObjectBuilder, SchemaNode};
//! use serde_json::json;
//!
//! let contract = Contract::new(
//!     "file_op",
//!     ObjectBuilder::new()
//!         .required("operation", SchemaNode::enumeration(["read", "write"]))
//!         .required("path", SchemaNode::string())
//!         .build(),
//! )
//! .unwrap();
//!
//! let outcome = validate(&json!({"operation": "delete", "path": "/x"}), &contract);
//! assert!(!outcome.is_valid());
//! assert_eq!(
//!     outcome.violations()[0].message,
//!     "invalid value at operation: must be one of [read, write]"
//! );
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod contract;
pub mod document;
pub mod error;
pub mod json_schema;
pub mod outcome;
pub mod registry;
pub mod validator;

// Re-exports for convenience
pub use contract::{Contract, FieldSpec, ObjectBuilder, ScalarKind, SchemaNode};
pub use document::{DocumentParser, ParseFailure};
pub use error::{ContractError, SchemaError};
pub use outcome::{ValidationOutcome, Violation, ROOT_PATH};
pub use registry::{ContractConfig, SchemaRegistry};
pub use validator::{json_type_name, validate, validate_node, validate_text};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
