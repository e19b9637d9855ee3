//! Context collaborator
//!
//! Turns a list of source identifiers into the text placed in the producer's
//! system preamble. Retrieval itself is out of scope; [`StaticContextSources`]
//! serves fixed text from memory.

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::ContextError;

/// Builds context text for a query
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Gather context for `query` from the named sources
    ///
    /// Sections appear in the order of `source_ids`.
    async fn build_context(&self, source_ids: &[String], query: &str) -> Result<String, ContextError>;
}

/// In-memory context sources keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct StaticContextSources {
    sources: IndexMap<String, String>,
}

impl StaticContextSources {
    /// Create empty source set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With one more source
    #[must_use]
    pub fn with_source(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    /// Add or replace a source
    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(id.into(), text.into());
    }

    /// Check if a source exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }
}

#[async_trait]
impl ContextSource for StaticContextSources {
    async fn build_context(&self, source_ids: &[String], _query: &str) -> Result<String, ContextError> {
        let mut sections = Vec::with_capacity(source_ids.len());
        for id in source_ids {
            let text = self
                .sources
                .get(id)
                .ok_or_else(|| ContextError::UnknownSource(id.clone()))?;
            sections.push(format!("## {id}\n{text}"));
        }
        Ok(sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn sections_follow_request_order() {
        let sources = StaticContextSources::new()
            .with_source("policy", "No deletes.")
            .with_source("layout", "Files live under /srv.");
        let text = sources.build_context(&ids(&["layout", "policy"]), "q").await.unwrap();
        assert_eq!(text, "## layout\nFiles live under /srv.\n\n## policy\nNo deletes.");
    }

    #[tokio::test]
    async fn unknown_source_fails() {
        let sources = StaticContextSources::new().with_source("policy", "x");
        let err = sources.build_context(&ids(&["policy", "faq"]), "q").await.unwrap_err();
        assert_eq!(err, ContextError::UnknownSource("faq".into()));
    }

    #[tokio::test]
    async fn no_sources_is_empty() {
        let sources = StaticContextSources::new();
        assert_eq!(sources.build_context(&[], "q").await.unwrap(), "");
        assert!(!sources.contains("policy"));
    }
}
