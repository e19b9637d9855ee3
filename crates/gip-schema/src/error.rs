//! Error types for contract definition and lookup
//!
//! Validation failures are never errors: they are reported as data in a
//! [`ValidationOutcome`](crate::ValidationOutcome). The errors here cover the
//! configuration side only:
//! - Malformed or unsupported contract definitions
//! - Lookups of contracts that were never registered

/// A contract definition could not be accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// Keyword outside the supported subset (`$ref`, `pattern`, ...)
    #[error("unsupported keyword '{keyword}' at {pointer}")]
    UnsupportedKeyword {
        /// JSON pointer of the offending node
        pointer: String,
        /// Rejected keyword
        keyword: String,
    },

    /// `type` names something the model cannot express
    #[error("unsupported type '{type_name}' at {pointer}")]
    UnsupportedType {
        /// JSON pointer of the offending node
        pointer: String,
        /// Rejected `type` value
        type_name: String,
    },

    /// Node is structurally malformed
    #[error("malformed schema at {pointer}: {reason}")]
    Malformed {
        /// JSON pointer of the offending node
        pointer: String,
        /// What is wrong with it
        reason: String,
    },

    /// Contract name is empty or whitespace
    #[error("contract name must not be empty")]
    EmptyName,
}

impl ContractError {
    /// Create malformed-node error
    pub fn malformed(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }
}

/// Schema registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// No contract registered under that name
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    /// Contract definition rejected at registration time
    #[error("invalid contract '{name}': {source}")]
    InvalidContract {
        /// Contract name
        name: String,
        /// Underlying definition error
        #[source]
        source: ContractError,
    },
}
