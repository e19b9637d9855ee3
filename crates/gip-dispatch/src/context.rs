//! Execution context
//!
//! Resolved identity for one request. Built once (by the caller, or lazily by
//! a registered [`ContextSupplier`]) and read-only afterwards: there are no
//! mutators, builder methods consume `self`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Deployment environment a request runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Test / staging
    Testing,
    /// Production
    Production,
}

impl Environment {
    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized environment name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment: '{0}'")]
pub struct UnknownEnvironment(pub String);

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(UnknownEnvironment(s.to_string())),
        }
    }
}

/// Caller identity and authority for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    actor_id: String,
    permissions: BTreeSet<String>,
    environment: Environment,
    request_id: String,
}

impl ExecutionContext {
    /// Create context for an actor with a fresh request ID
    #[must_use]
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            permissions: BTreeSet::new(),
            environment: Environment::default(),
            request_id: Ulid::new().to_string(),
        }
    }

    /// With permissions (replaces any set so far)
    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// With one more permission
    #[inline]
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    /// With environment
    #[inline]
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// With explicit request ID
    #[inline]
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Acting identity
    #[inline]
    #[must_use]
    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    /// Granted permissions
    #[inline]
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Environment
    #[inline]
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Request ID
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Check a single permission
    #[inline]
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Lazily builds a default context when a dispatch call supplies none
///
/// Returning `None` means no context can be resolved for this call.
pub trait ContextSupplier: Send + Sync {
    /// Build a context
    fn supply(&self) -> Option<ExecutionContext>;
}

impl<F> ContextSupplier for F
where
    F: Fn() -> Option<ExecutionContext> + Send + Sync,
{
    fn supply(&self) -> Option<ExecutionContext> {
        self()
    }
}
