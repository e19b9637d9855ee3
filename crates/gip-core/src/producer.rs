//! Producer collaborator
//!
//! The producer is the generative backend. The pipeline only needs one call:
//! send a request, get text back. Everything about the wire protocol stays on
//! the implementation side of [`Producer`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::ProducerError;

/// Output format requested from the producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Structured JSON, optionally with a JSON-Schema hint
    Json {
        /// Schema the output should follow
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<Value>,
    },
    /// Free text
    Text,
}

impl ResponseFormat {
    /// JSON output with a schema hint
    #[inline]
    #[must_use]
    pub fn json_with_schema(schema: Value) -> Self {
        ResponseFormat::Json {
            schema: Some(schema),
        }
    }

    /// Kind without the hint
    #[inline]
    #[must_use]
    pub fn kind(&self) -> FormatKind {
        match self {
            ResponseFormat::Json { .. } => FormatKind::Json,
            ResponseFormat::Text => FormatKind::Text,
        }
    }
}

impl Default for ResponseFormat {
    fn default() -> Self {
        ResponseFormat::Json { schema: None }
    }
}

/// Format a response claims to be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// JSON
    #[default]
    Json,
    /// Free text
    Text,
}

impl FormatKind {
    /// Display name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FormatKind::Json => "JSON",
            FormatKind::Text => "text",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One producer call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerRequest {
    /// User-facing prompt
    pub prompt: String,
    /// System-level preamble (context framing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_preamble: Option<String>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Requested output format
    #[serde(default)]
    pub format: ResponseFormat,
}

impl ProducerRequest {
    /// Create request asking for JSON
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_preamble: None,
            temperature: None,
            format: ResponseFormat::default(),
        }
    }

    /// With system preamble
    #[inline]
    #[must_use]
    pub fn with_system_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.system_preamble = Some(preamble.into());
        self
    }

    /// With temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// With output format
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    /// Same request with `notice` appended to the prompt
    #[must_use]
    pub fn follow_up(&self, notice: &str) -> Self {
        Self {
            prompt: format!("{}\n\n{notice}", self.prompt),
            ..self.clone()
        }
    }
}

/// Text returned by a producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerResponse {
    /// Raw content
    pub content: String,
    /// Format the producer says it used
    pub declared_format: FormatKind,
}

impl ProducerResponse {
    /// JSON response
    #[inline]
    #[must_use]
    pub fn json(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            declared_format: FormatKind::Json,
        }
    }

    /// Text response
    #[inline]
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            declared_format: FormatKind::Text,
        }
    }
}

/// Generative backend
///
/// Each call is independent. Implementations must not cache responses: the
/// regeneration loop relies on every call being a fresh attempt.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Produce a response for `request`
    async fn call(&self, request: &ProducerRequest) -> Result<ProducerResponse, ProducerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn follow_up_appends_to_prompt_only() {
        let request = ProducerRequest::new("list files")
            .with_system_preamble("ctx")
            .with_temperature(Some(0.1))
            .with_format(ResponseFormat::json_with_schema(json!({"type": "string"})));
        let next = request.follow_up("fix it");
        assert_eq!(next.prompt, "list files\n\nfix it");
        assert_eq!(next.system_preamble, request.system_preamble);
        assert_eq!(next.format, request.format);
        assert_eq!(next.temperature, Some(0.1));
    }

    #[test]
    fn format_wire_shape() {
        let format = ResponseFormat::json_with_schema(json!({"type": "string"}));
        assert_eq!(
            serde_json::to_value(&format).unwrap(),
            json!({"type": "json", "schema": {"type": "string"}})
        );
        assert_eq!(serde_json::to_value(ResponseFormat::Text).unwrap(), json!({"type": "text"}));
        assert_eq!(format.kind(), FormatKind::Json);
    }

    #[test]
    fn response_constructors() {
        assert_eq!(ProducerResponse::json("{}").declared_format, FormatKind::Json);
        assert_eq!(ProducerResponse::text("hi").declared_format.to_string(), "text");
    }
}
