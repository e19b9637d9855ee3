//! Error types for GIP Core
//!
//! Only faults live here. An invalid document or a rejected action is a
//! result (`ValidationOutcome`, `ActionOutcome`), not an error.

use gip_schema::{ContractError, SchemaError};
use std::path::PathBuf;

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No contract registered under the requested name
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    /// No action registered under the requested identifier
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Contract definition could not be built
    #[error("invalid contract '{name}': {source}")]
    InvalidContract {
        /// Contract name
        name: String,
        /// Underlying definition error
        #[source]
        source: ContractError,
    },

    /// Context collaborator failed
    #[error("context error: {0}")]
    Context(#[from] ContextError),

    /// Producer call failed
    #[error("producer error: {0}")]
    Producer(#[from] ProducerError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request exceeded the configured timeout
    #[error("operation timed out after {duration_secs}s")]
    Timeout {
        /// Configured limit
        duration_secs: u64,
    },

    /// Caller cancelled the request
    #[error("operation cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Check if error stems from setup rather than the request
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownContract(_)
                | Self::UnknownAction(_)
                | Self::InvalidContract { .. }
                | Self::Config(_)
        )
    }

    /// Check if the caller may reasonably retry the whole request
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Producer(ProducerError::Transport(_)) | Self::Timeout { .. }
        )
    }
}

impl From<SchemaError> for PipelineError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownContract(name) => Self::UnknownContract(name),
            SchemaError::InvalidContract { name, source } => Self::InvalidContract { name, source },
        }
    }
}

/// Producer faults
///
/// A producer that answers with malformed content has not failed; these
/// cover the cases where no content came back at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProducerError {
    /// Backend unreachable or connection dropped
    #[error("transport failure: {0}")]
    Transport(String),

    /// Backend refused the request
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// Context collaborator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// Requested source is not known
    #[error("unknown context source: {0}")]
    UnknownSource(String),

    /// Source exists but could not be read
    #[error("context source '{source_id}' unavailable: {reason}")]
    Unavailable {
        /// Source identifier
        source_id: String,
        /// Why
        reason: String,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File contents did not parse
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Extension is not toml, yaml, yml or json
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Field value out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Configured contract rejected
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ConfigError {
    /// Create invalid-value error
    #[inline]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_errors_map_to_pipeline_variants() {
        let err: PipelineError = SchemaError::UnknownContract("file_op".into()).into();
        assert!(matches!(err, PipelineError::UnknownContract(ref n) if n == "file_op"));
        assert!(err.is_configuration());
        assert!(!err.is_retryable());
    }

    #[test]
    fn retryable_classification() {
        assert!(PipelineError::Timeout { duration_secs: 5 }.is_retryable());
        assert!(PipelineError::from(ProducerError::Transport("reset".into())).is_retryable());
        assert!(!PipelineError::from(ProducerError::Rejected("quota".into())).is_retryable());
        assert!(!PipelineError::Cancelled.is_retryable());
        assert!(!PipelineError::Cancelled.is_configuration());
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            PipelineError::Timeout { duration_secs: 30 }.to_string(),
            "operation timed out after 30s"
        );
        assert_eq!(
            PipelineError::from(ContextError::UnknownSource("docs".into())).to_string(),
            "context error: unknown context source: docs"
        );
        assert_eq!(
            ConfigError::invalid("max_attempts", "must be at least 1").to_string(),
            "invalid value for max_attempts: must be at least 1"
        );
    }
}
