//! Raw producer text → document
//!
//! Producers asked for JSON frequently answer with the JSON wrapped in a
//! Markdown code fence, sometimes with prose around it. The parser accepts
//! the bare document first and, unless strict, falls back to the first fenced
//! block tagged `json` (or untagged) that parses.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde_json::Value;

/// Text that could not be turned into a document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("document is not well-formed JSON: {message}")]
pub struct ParseFailure {
    /// Underlying parser message
    pub message: String,
}

/// Parser for producer output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentParser {
    fenced: bool,
}

impl DocumentParser {
    /// Parser that also looks inside Markdown code fences
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { fenced: true }
    }

    /// Parser that only accepts a bare JSON document
    #[inline]
    #[must_use]
    pub fn strict() -> Self {
        Self { fenced: false }
    }

    /// Enable or disable code-fence extraction
    #[inline]
    #[must_use]
    pub fn with_fenced(mut self, fenced: bool) -> Self {
        self.fenced = fenced;
        self
    }

    /// Whether code-fence extraction is enabled
    #[inline]
    #[must_use]
    pub fn fenced(&self) -> bool {
        self.fenced
    }

    /// Parse raw text into a document
    ///
    /// # Errors
    /// `ParseFailure` carrying the message from parsing the bare text.
    pub fn parse(&self, raw: &str) -> Result<Value, ParseFailure> {
        let direct = serde_json::from_str::<Value>(raw.trim());
        let err = match direct {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if self.fenced {
            for block in fenced_json_blocks(raw) {
                if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
                    tracing::debug!("extracted document from fenced code block");
                    return Ok(value);
                }
            }
        }

        Err(ParseFailure {
            message: err.to_string(),
        })
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Contents of fenced code blocks whose info string is `json` or empty
fn fenced_json_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let lang = info.split_whitespace().next().unwrap_or("");
                if lang.is_empty() || lang.eq_ignore_ascii_case("json") {
                    current = Some(String::new());
                }
            }
            Event::Text(chunk) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&chunk);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(buf) = current.take() {
                    blocks.push(buf);
                }
            }
            _ => {}
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_document() {
        let value = DocumentParser::new()
            .parse("  {\"operation\": \"read\"}\n")
            .unwrap();
        assert_eq!(value, json!({"operation": "read"}));
    }

    #[test]
    fn extracts_json_fence() {
        let raw = "Here is the instruction:\n\n```json\n{\"path\": \"/x\"}\n```\n";
        let value = DocumentParser::new().parse(raw).unwrap();
        assert_eq!(value, json!({"path": "/x"}));
    }

    #[test]
    fn skips_non_json_fences() {
        let raw = "```python\nprint(1)\n```\n\n```\n[1, 2]\n```\n";
        let value = DocumentParser::new().parse(raw).unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn strict_parser_ignores_fences() {
        let raw = "```json\n{\"path\": \"/x\"}\n```";
        let err = DocumentParser::strict().parse(raw).unwrap_err();
        assert!(err.to_string().starts_with("document is not well-formed JSON"));
    }

    #[test]
    fn prose_is_a_parse_failure() {
        assert!(DocumentParser::new().parse("I cannot do that.").is_err());
        assert!(DocumentParser::new().parse("").is_err());
    }
}
