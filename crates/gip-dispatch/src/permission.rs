//! Permission predicates and the gate that applies them
//!
//! The gate owns *where* authorization happens (immediately before dispatch,
//! on every call); each action definition owns *what* is checked.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::action::ActionDefinition;
use crate::context::{Environment, ExecutionContext};

type PredicateFn = dyn Fn(&ExecutionContext) -> bool + Send + Sync;

/// Authorization rule attached to an action
#[derive(Clone)]
pub struct PermissionPredicate {
    check: Arc<PredicateFn>,
    description: String,
}

impl PermissionPredicate {
    /// Any context is authorized
    #[must_use]
    pub fn allow_all() -> Self {
        Self::custom("allow all", |_| true)
    }

    /// Context must hold every listed permission
    #[must_use]
    pub fn require_all<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let required: BTreeSet<String> = permissions.into_iter().map(Into::into).collect();
        let description = format!("requires all of {}", render(&required));
        Self::custom(description, move |ctx| {
            required.iter().all(|p| ctx.has_permission(p))
        })
    }

    /// Context must hold at least one listed permission
    #[must_use]
    pub fn require_any<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let accepted: BTreeSet<String> = permissions.into_iter().map(Into::into).collect();
        let description = format!("requires any of {}", render(&accepted));
        Self::custom(description, move |ctx| {
            accepted.iter().any(|p| ctx.has_permission(p))
        })
    }

    /// Context must run in one of the listed environments
    #[must_use]
    pub fn environment_in<I>(environments: I) -> Self
    where
        I: IntoIterator<Item = Environment>,
    {
        let allowed: Vec<Environment> = environments.into_iter().collect();
        let names: Vec<&str> = allowed.iter().map(|e| e.as_str()).collect();
        let description = format!("environment in [{}]", names.join(", "));
        Self::custom(description, move |ctx| allowed.contains(&ctx.environment()))
    }

    /// Arbitrary rule
    pub fn custom<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
            description: description.into(),
        }
    }

    /// Both rules must pass (short-circuits on the first)
    #[must_use]
    pub fn and(self, other: PermissionPredicate) -> Self {
        let description = format!("({}) and ({})", self.description, other.description);
        Self::custom(description, move |ctx| self.evaluate(ctx) && other.evaluate(ctx))
    }

    /// Either rule may pass (short-circuits on the first)
    #[must_use]
    pub fn or(self, other: PermissionPredicate) -> Self {
        let description = format!("({}) or ({})", self.description, other.description);
        Self::custom(description, move |ctx| self.evaluate(ctx) || other.evaluate(ctx))
    }

    /// Apply the rule
    #[inline]
    #[must_use]
    pub fn evaluate(&self, context: &ExecutionContext) -> bool {
        (self.check)(context)
    }

    /// Human-readable rule
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for PermissionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionPredicate")
            .field("description", &self.description)
            .finish()
    }
}

fn render(set: &BTreeSet<String>) -> String {
    let items: Vec<&str> = set.iter().map(String::as_str).collect();
    format!("[{}]", items.join(", "))
}

/// Authorization checkpoint run before every handler invocation
///
/// Adds no policy of its own: it evaluates the definition's predicate and
/// records the decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionGate;

impl PermissionGate {
    /// Create new gate
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decide whether `context` may run `definition`
    #[must_use]
    pub fn authorize(&self, definition: &ActionDefinition, context: &ExecutionContext) -> bool {
        let allowed = definition.permission().evaluate(context);
        if allowed {
            tracing::debug!(
                action = %definition.identifier(),
                actor = %context.actor_id(),
                request_id = %context.request_id(),
                "permission granted"
            );
        } else {
            tracing::warn!(
                action = %definition.identifier(),
                actor = %context.actor_id(),
                request_id = %context.request_id(),
                rule = %definition.permission().description(),
                "permission denied"
            );
        }
        allowed
    }
}
