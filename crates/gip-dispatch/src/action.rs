//! Action definitions and handlers
//!
//! An action pairs an identifier with the contract its parameters must
//! satisfy, the permission rule that guards it, and the handler that performs
//! its side effects.

use async_trait::async_trait;
use gip_schema::Contract;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::permission::PermissionPredicate;

/// Fault raised by a handler
///
/// The dispatcher turns this into an `EXECUTION_ERROR` outcome, keeping the
/// message and details intact.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    /// What went wrong
    pub message: String,
    /// Structured diagnostics
    pub details: Option<Value>,
}

impl HandlerError {
    /// Create handler error
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// With structured details
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Side-effecting implementation of an action
///
/// Receives parameters that have already passed the action's input contract.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Perform the action
    async fn handle(&self, params: Value, context: &ExecutionContext) -> Result<Value, HandlerError>;
}

/// Handler backed by an async closure
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    async fn handle(&self, params: Value, context: &ExecutionContext) -> Result<Value, HandlerError> {
        (self.f)(params, context.clone()).await
    }
}

/// Wrap an async closure as a handler
///
/// ```rust
/// use gip_dispatch::{handler_fn, HandlerError};
/// use serde_json::json;
///
/// let handler = handler_fn(|params, _ctx| async move {
///     Ok::<_, HandlerError>(json!({ "echo": params }))
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    FnHandler { f }
}

/// Registered action
#[derive(Clone)]
pub struct ActionDefinition {
    identifier: String,
    description: Option<String>,
    input: Arc<Contract>,
    permission: PermissionPredicate,
    handler: Arc<dyn ActionHandler>,
}

impl ActionDefinition {
    /// Create action definition
    pub fn new<H>(
        identifier: impl Into<String>,
        input: impl Into<Arc<Contract>>,
        permission: PermissionPredicate,
        handler: H,
    ) -> Self
    where
        H: ActionHandler + 'static,
    {
        Self {
            identifier: identifier.into(),
            description: None,
            input: input.into(),
            permission,
            handler: Arc::new(handler),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Unique identifier
    #[inline]
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Optional description
    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Contract the parameters must satisfy
    #[inline]
    #[must_use]
    pub fn input_contract(&self) -> &Contract {
        &self.input
    }

    /// Authorization rule
    #[inline]
    #[must_use]
    pub fn permission(&self) -> &PermissionPredicate {
        &self.permission
    }

    /// Handler (shared)
    #[inline]
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn ActionHandler> {
        &self.handler
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("identifier", &self.identifier)
            .field("description", &self.description)
            .field("input", &self.input.name())
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gip_schema::SchemaNode;
    use serde_json::json;

    fn echo() -> ActionDefinition {
        ActionDefinition::new(
            "echo",
            Contract::new("any_string", SchemaNode::string()).unwrap(),
            PermissionPredicate::allow_all(),
            handler_fn(|params, ctx| async move {
                Ok::<_, HandlerError>(json!({ "params": params, "actor": ctx.actor_id() }))
            }),
        )
        .with_description("echo parameters back")
    }

    #[tokio::test]
    async fn fn_handler_runs_closure() {
        let def = echo();
        let ctx = ExecutionContext::new("alice");
        let out = def.handler().handle(json!("hi"), &ctx).await.unwrap();
        assert_eq!(out, json!({"params": "hi", "actor": "alice"}));
    }

    #[test]
    fn definition_accessors() {
        let def = echo();
        assert_eq!(def.identifier(), "echo");
        assert_eq!(def.input_contract().name(), "any_string");
        assert_eq!(def.description(), Some("echo parameters back"));
        assert!(format!("{def:?}").contains("any_string"));
    }

    #[test]
    fn handler_error_builders() {
        let err = HandlerError::from("smtp unavailable").with_details(json!({"retry_after": 30}));
        assert_eq!(err.to_string(), "smtp unavailable");
        assert_eq!(err.details, Some(json!({"retry_after": 30})));
    }
}
