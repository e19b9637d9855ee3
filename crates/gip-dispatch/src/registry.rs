//! Action registry
//!
//! Identifier → definition map owned by the dispatcher. Re-registering an
//! identifier replaces the previous definition.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::action::ActionDefinition;

/// Registry of actions keyed by identifier
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Arc<ActionDefinition>>>,
}

impl ActionRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action, returning the definition it replaced
    pub fn register(&self, definition: ActionDefinition) -> Option<Arc<ActionDefinition>> {
        let identifier = definition.identifier().to_string();
        let previous = self
            .actions
            .write()
            .insert(identifier.clone(), Arc::new(definition));
        if previous.is_some() {
            tracing::warn!(action = %identifier, "action replaced");
        } else {
            tracing::debug!(action = %identifier, "action registered");
        }
        previous
    }

    /// Remove an action
    pub fn unregister(&self, identifier: &str) -> Option<Arc<ActionDefinition>> {
        let removed = self.actions.write().remove(identifier);
        if removed.is_some() {
            tracing::debug!(action = %identifier, "action unregistered");
        }
        removed
    }

    /// Look up an action
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<Arc<ActionDefinition>> {
        self.actions.read().get(identifier).cloned()
    }

    /// Check if an action exists
    #[inline]
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.actions.read().contains_key(identifier)
    }

    /// Registered identifiers, sorted
    #[must_use]
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.actions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered actions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.read().len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.read().is_empty()
    }
}
