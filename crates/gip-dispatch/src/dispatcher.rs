//! Action dispatcher
//!
//! Runs one action call through a fixed sequence of checks and stops at the
//! first one that fails:
//!
//! 1. lookup (`ACTION_NOT_FOUND`)
//! 2. context resolution (`CONTEXT_MISSING`)
//! 3. permission gate (`PERMISSION_DENIED`)
//! 4. input re-validation (`INVALID_PARAMETERS`)
//! 5. handler, invoked exactly once (`EXECUTION_ERROR` on error or panic)
//!
//! No later step observes the call when an earlier one fails.

use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::action::ActionDefinition;
use crate::context::{ContextSupplier, ExecutionContext};
use crate::outcome::{ActionError, ActionOutcome, ErrorCode};
use crate::permission::PermissionGate;
use crate::registry::ActionRegistry;

/// Permission-gated executor for registered actions
pub struct ActionDispatcher {
    registry: Arc<ActionRegistry>,
    supplier: RwLock<Option<Arc<dyn ContextSupplier>>>,
    gate: PermissionGate,
}

impl ActionDispatcher {
    /// Create dispatcher with an empty registry and no supplier
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(Arc::new(ActionRegistry::new()))
    }

    /// Create dispatcher over an existing registry
    #[must_use]
    pub fn with_registry(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            supplier: RwLock::new(None),
            gate: PermissionGate::new(),
        }
    }

    /// Underlying registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Register an action (last write wins)
    pub fn register(&self, definition: ActionDefinition) -> Option<Arc<ActionDefinition>> {
        self.registry.register(definition)
    }

    /// Remove an action
    pub fn unregister(&self, identifier: &str) -> Option<Arc<ActionDefinition>> {
        self.registry.unregister(identifier)
    }

    /// Check if an action is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.registry.contains(identifier)
    }

    /// Install the lazy default-context supplier
    pub fn set_context_supplier<S>(&self, supplier: S)
    where
        S: ContextSupplier + 'static,
    {
        *self.supplier.write() = Some(Arc::new(supplier));
        tracing::debug!("context supplier installed");
    }

    /// Remove the default-context supplier
    pub fn clear_context_supplier(&self) {
        *self.supplier.write() = None;
    }

    /// Dispatch an action call
    ///
    /// Never returns an error: every failure is an [`ActionOutcome::Failure`]
    /// with a stable [`ErrorCode`].
    pub async fn dispatch(
        &self,
        identifier: &str,
        params: Value,
        context: Option<ExecutionContext>,
    ) -> ActionOutcome {
        let Some(definition) = self.registry.get(identifier) else {
            tracing::info!(action = %identifier, code = %ErrorCode::ActionNotFound, "dispatch rejected");
            return ActionOutcome::failure(
                ErrorCode::ActionNotFound,
                format!("no action registered as '{identifier}'"),
            );
        };

        let Some(context) = context.or_else(|| self.supply_context()) else {
            tracing::info!(action = %identifier, code = %ErrorCode::ContextMissing, "dispatch rejected");
            return ActionOutcome::failure(
                ErrorCode::ContextMissing,
                format!("no execution context available for '{identifier}'"),
            );
        };

        if !self.gate.authorize(&definition, &context) {
            return ActionOutcome::failure(
                ErrorCode::PermissionDenied,
                format!(
                    "actor '{}' is not permitted to run '{identifier}'",
                    context.actor_id()
                ),
            );
        }

        let checked = gip_schema::validate(&params, definition.input_contract());
        if !checked.is_valid() {
            let count = checked.violations().len();
            tracing::info!(
                action = %identifier,
                request_id = %context.request_id(),
                violations = count,
                "dispatch rejected: invalid parameters"
            );
            let details = serde_json::to_value(checked.violations()).unwrap_or_default();
            return ActionError::new(
                ErrorCode::InvalidParameters,
                format!(
                    "parameters for '{identifier}' violate contract '{}' ({count} violation(s))",
                    definition.input_contract().name()
                ),
            )
            .with_details(details)
            .into();
        }

        let outcome = self.invoke(&definition, params, &context).await;
        tracing::info!(
            action = %identifier,
            request_id = %context.request_id(),
            success = outcome.is_success(),
            "dispatch finished"
        );
        outcome
    }

    fn supply_context(&self) -> Option<ExecutionContext> {
        let supplier = self.supplier.read().clone()?;
        supplier.supply()
    }

    async fn invoke(
        &self,
        definition: &ActionDefinition,
        params: Value,
        context: &ExecutionContext,
    ) -> ActionOutcome {
        let call = definition.handler().handle(params, context);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(data)) => ActionOutcome::success(data),
            Ok(Err(err)) => {
                tracing::warn!(
                    action = %definition.identifier(),
                    request_id = %context.request_id(),
                    error = %err,
                    "handler failed"
                );
                let mut error = ActionError::new(ErrorCode::ExecutionError, err.message);
                error.details = err.details;
                error.into()
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(
                    action = %definition.identifier(),
                    request_id = %context.request_id(),
                    panic = %message,
                    "handler panicked"
                );
                ActionOutcome::failure(
                    ErrorCode::ExecutionError,
                    format!("handler panicked: {message}"),
                )
            }
        }
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("actions", &self.registry.identifiers())
            .field("supplier", &self.supplier.read().is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{handler_fn, HandlerError};
    use crate::permission::PermissionPredicate;
    use gip_schema::{Contract, ObjectBuilder, SchemaNode};
    use serde_json::json;

    fn greet() -> ActionDefinition {
        ActionDefinition::new(
            "greet",
            Contract::new(
                "greet_params",
                ObjectBuilder::new().required("name", SchemaNode::string()).build(),
            )
            .unwrap(),
            PermissionPredicate::allow_all(),
            handler_fn(|params, _| async move {
                Ok::<_, HandlerError>(json!(format!("hello {}", params["name"].as_str().unwrap_or(""))))
            }),
        )
    }

    #[tokio::test]
    async fn dispatch_success() {
        let dispatcher = ActionDispatcher::new();
        dispatcher.register(greet());
        let outcome = dispatcher
            .dispatch("greet", json!({"name": "ada"}), Some(ExecutionContext::new("u")))
            .await;
        assert_eq!(outcome, ActionOutcome::success(json!("hello ada")));
    }

    #[tokio::test]
    async fn unknown_action() {
        let dispatcher = ActionDispatcher::new();
        let outcome = dispatcher.dispatch("nope", json!({}), None).await;
        assert_eq!(outcome.code(), Some(ErrorCode::ActionNotFound));
    }

    #[tokio::test]
    async fn cleared_supplier_is_not_used() {
        let dispatcher = ActionDispatcher::new();
        dispatcher.register(greet());
        dispatcher.set_context_supplier(|| Some(ExecutionContext::new("svc")));
        dispatcher.clear_context_supplier();
        let outcome = dispatcher.dispatch("greet", json!({"name": "x"}), None).await;
        assert_eq!(outcome.code(), Some(ErrorCode::ContextMissing));
    }

    #[test]
    fn panic_message_variants() {
        let static_str: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(static_str.as_ref()), "boom");
        assert_eq!(panic_message(owned.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
