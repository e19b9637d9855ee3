//! Pipeline configuration
//!
//! Loaded from TOML, YAML or JSON by file extension. Every field has a
//! default, so an empty file is a valid configuration.

use gip_schema::{ContractConfig, DocumentParser, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::regeneration::DEFAULT_MAX_ATTEMPTS;

/// Default header placed before context text in the system preamble
pub const DEFAULT_CONTEXT_PREAMBLE: &str = "Use the following context to answer the request.";

/// Upper bound accepted for sampling temperature
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Producer calls per request, including the first
    pub max_attempts: u32,
    /// Sampling temperature passed to the producer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Whole-request deadline in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Accept JSON wrapped in Markdown code fences
    pub fenced_documents: bool,
    /// Header line placed before context text
    pub context_preamble: String,
    /// Contracts registered at start-up
    pub contracts: Vec<ContractConfig>,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max attempts
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// With temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// With fenced-document extraction on or off
    #[inline]
    #[must_use]
    pub fn with_fenced_documents(mut self, fenced: bool) -> Self {
        self.fenced_documents = fenced;
        self
    }

    /// With context preamble header
    #[inline]
    #[must_use]
    pub fn with_context_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.context_preamble = preamble.into();
        self
    }

    /// With one more configured contract
    #[must_use]
    pub fn with_contract(mut self, contract: ContractConfig) -> Self {
        self.contracts.push(contract);
        self
    }

    /// Load and validate a configuration file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - `ConfigError::UnsupportedFormat` for unknown extensions
    /// - `ConfigError::Parse` if the contents do not deserialize
    /// - `ConfigError::Invalid` if a value is out of range
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let config: Self = match extension.as_deref() {
            Some("toml") => toml::from_str(&text).map_err(|e| parse_error(e.to_string()))?,
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&text).map_err(|e| parse_error(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&text).map_err(|e| parse_error(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        config.validate()?;
        tracing::debug!(path = %path.display(), contracts = config.contracts.len(), "configuration loaded");
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// - `ConfigError::Invalid` for `max_attempts = 0`, a temperature outside
    ///   `[0, 2]` or a zero timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if let Some(t) = self.temperature {
            check_temperature(t)?;
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::invalid(
                "request_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Request deadline, if configured
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Document parser matching `fenced_documents`
    #[inline]
    #[must_use]
    pub fn document_parser(&self) -> DocumentParser {
        DocumentParser::new().with_fenced(self.fenced_documents)
    }

    /// Build a schema registry from the configured contracts
    ///
    /// # Errors
    /// - `ConfigError::Schema` if a contract uses unsupported constructs
    pub fn schema_registry(&self) -> Result<SchemaRegistry, ConfigError> {
        Ok(SchemaRegistry::from_config(&self.contracts)?)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            temperature: None,
            request_timeout_secs: None,
            fenced_documents: true,
            context_preamble: DEFAULT_CONTEXT_PREAMBLE.to_string(),
            contracts: Vec::new(),
        }
    }
}

pub(crate) fn check_temperature(temperature: f32) -> Result<(), ConfigError> {
    if (0.0..=MAX_TEMPERATURE).contains(&temperature) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            "temperature",
            format!("{temperature} is outside [0, {MAX_TEMPERATURE}]"),
        ))
    }
}
