//! GIP Dispatch - permission-gated action execution
//!
//! Actions are registered with an input contract, a permission predicate and
//! a handler. [`ActionDispatcher::dispatch`] resolves the caller's context,
//! checks permission, re-validates the parameters and only then runs the
//! handler. Every failure comes back as an [`ActionOutcome`] with a stable
//! [`ErrorCode`].
//!
//! # Example
//!
//! ```rust
//! use gip_dispatch::{
//!     handler_fn, ActionDefinition, ActionDispatcher, ErrorCode, ExecutionContext,
//!     HandlerError, PermissionPredicate,
//! };
//! use gip_schema::{Contract, ObjectBuilder, SchemaNode};
//! use serde_json::json;
//!
//! # futures::executor::block_on(async {
//! let dispatcher = ActionDispatcher::new();
//! dispatcher.register(ActionDefinition::new(
//!     "send_email",
//!     Contract::new(
//!         "email",
//!         ObjectBuilder::new().required("to", SchemaNode::string()).build(),
//!     )
//!     .unwrap(),
//!     PermissionPredicate::require_all(["send_email"]),
//!     handler_fn(|_, _| async { Ok::<_, HandlerError>(json!({"queued": true})) }),
//! ));
//!
//! let reader = ExecutionContext::new("u1").with_permissions(["read"]);
//! let outcome = dispatcher
//!     .dispatch("send_email", json!({"to": "a@b.c"}), Some(reader))
//!     .await;
//! assert_eq!(outcome.code(), Some(ErrorCode::PermissionDenied));
//! # });
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod action;
pub mod context;
pub mod dispatcher;
pub mod outcome;
pub mod permission;
pub mod registry;

pub use action::{handler_fn, ActionDefinition, ActionHandler, FnHandler, HandlerError};
pub use context::{ContextSupplier, Environment, ExecutionContext, UnknownEnvironment};
pub use dispatcher::ActionDispatcher;
pub use outcome::{ActionError, ActionOutcome, ErrorCode};
pub use permission::{PermissionGate, PermissionPredicate};
pub use registry::ActionRegistry;
