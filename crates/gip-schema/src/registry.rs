//! Schema registry
//!
//! Single owner of named contracts. Lookups happen on every request, so the
//! map sits behind a read-write lock and hands out `Arc` snapshots: no lock is
//! ever held by a caller after `get` returns.
//!
//! Registering a name that already exists replaces the previous contract
//! (last write wins); the replaced contract is returned to the caller.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::contract::Contract;
use crate::error::SchemaError;

/// Contract declared in configuration
///
/// `schema` is a document in the supported JSON-Schema subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Registry name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-Schema subset document
    pub schema: Value,
}

/// Registry of named contracts
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    contracts: RwLock<HashMap<String, Arc<Contract>>>,
}

impl SchemaRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured contracts
    ///
    /// Later entries replace earlier ones with the same name.
    ///
    /// # Errors
    /// - `SchemaError::InvalidContract` for the first entry that fails conversion
    pub fn from_config(contracts: &[ContractConfig]) -> Result<Self, SchemaError> {
        let registry = Self::new();
        registry.register_config(contracts)?;
        Ok(registry)
    }

    /// Register configured contracts into this registry
    ///
    /// Entries before a rejected one stay registered.
    ///
    /// # Errors
    /// - `SchemaError::InvalidContract` for the first entry that fails conversion
    pub fn register_config(&self, contracts: &[ContractConfig]) -> Result<(), SchemaError> {
        for entry in contracts {
            let mut contract = Contract::from_json_schema(&entry.name, &entry.schema).map_err(
                |source| SchemaError::InvalidContract {
                    name: entry.name.clone(),
                    source,
                },
            )?;
            if let Some(description) = &entry.description {
                contract = contract.with_description(description.clone());
            }
            self.register(contract);
        }
        Ok(())
    }

    /// Register a contract under its own name
    ///
    /// Returns the contract previously registered under that name, if any.
    pub fn register(&self, contract: Contract) -> Option<Arc<Contract>> {
        let name = contract.name().to_string();
        let previous = self.contracts.write().insert(name.clone(), Arc::new(contract));
        if previous.is_some() {
            tracing::warn!(contract = %name, "contract replaced");
        } else {
            tracing::debug!(contract = %name, "contract registered");
        }
        previous
    }

    /// Register a contract from a JSON-Schema subset document
    ///
    /// # Errors
    /// - `SchemaError::InvalidContract` if the schema uses unsupported constructs
    pub fn register_json_schema(
        &self,
        name: &str,
        schema: &Value,
    ) -> Result<Option<Arc<Contract>>, SchemaError> {
        let contract =
            Contract::from_json_schema(name, schema).map_err(|source| SchemaError::InvalidContract {
                name: name.to_string(),
                source,
            })?;
        Ok(self.register(contract))
    }

    /// Remove a contract
    pub fn unregister(&self, name: &str) -> Option<Arc<Contract>> {
        let removed = self.contracts.write().remove(name);
        if removed.is_some() {
            tracing::debug!(contract = %name, "contract unregistered");
        }
        removed
    }

    /// Look up a contract
    ///
    /// # Errors
    /// - `SchemaError::UnknownContract` if nothing is registered under `name`
    pub fn get(&self, name: &str) -> Result<Arc<Contract>, SchemaError> {
        self.contracts
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownContract(name.to_string()))
    }

    /// Check if a contract exists
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.contracts.read().contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.contracts.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered contracts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.read().len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.read().is_empty()
    }
}
