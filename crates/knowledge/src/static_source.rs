//! Local knowledge sources: passages from a JSON file, and a disabled source.

use async_trait::async_trait;
use ferrodesk_core::error::RetrievalError;
use ferrodesk_core::knowledge::{KnowledgeSource, RetrievalResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One passage in a static knowledge file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticEntry {
    pub content: String,

    #[serde(default)]
    pub source_location: String,

    /// Extra terms that should match this passage
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Scores passages by how many query terms they contain.
///
/// Score is the fraction of distinct query terms (4+ characters, case
/// insensitive) found in the passage or its keywords, so it lies in `[0, 1]`.
pub struct StaticKnowledgeSource {
    entries: Vec<StaticEntry>,
}

impl StaticKnowledgeSource {
    pub fn new(entries: Vec<StaticEntry>) -> Self {
        Self { entries }
    }

    /// Load a JSON array of [`StaticEntry`].
    pub fn from_file(path: &Path) -> Result<Self, RetrievalError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::NotConfigured(format!("cannot read {}: {e}", path.display()))
        })?;
        let entries: Vec<StaticEntry> = serde_json::from_str(&content).map_err(|e| {
            RetrievalError::NotConfigured(format!("invalid knowledge file {}: {e}", path.display()))
        })?;
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn score(entry: &StaticEntry, terms: &HashSet<String>) -> f32 {
        if terms.is_empty() {
            return 0.0;
        }
        let mut haystack = entry.content.to_lowercase();
        for keyword in &entry.keywords {
            haystack.push(' ');
            haystack.push_str(&keyword.to_lowercase());
        }
        let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
        hits as f32 / terms.len() as f32
    }
}

fn query_terms(query: &str) -> HashSet<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(|w| w.to_lowercase())
        .collect()
}

#[async_trait]
impl KnowledgeSource for StaticKnowledgeSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn query(
        &self,
        query: &str,
        _max_results: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let terms = query_terms(query);
        Ok(self
            .entries
            .iter()
            .map(|e| RetrievalResult::new(&e.content, Self::score(e, &terms), &e.source_location))
            .filter(|r| r.score > 0.0)
            .collect())
    }
}

/// A knowledge source that is always unavailable.
pub struct DisabledKnowledgeSource {
    reason: String,
}

impl DisabledKnowledgeSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl KnowledgeSource for DisabledKnowledgeSource {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn query(&self, _query: &str, _max: usize) -> Result<Vec<RetrievalResult>, RetrievalError> {
        Err(RetrievalError::NotConfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> StaticKnowledgeSource {
        StaticKnowledgeSource::new(vec![
            StaticEntry {
                content: "Puedes pagar en cualquier tienda OXXO con tu referencia.".into(),
                source_location: "faq/pagos.md".into(),
                keywords: vec!["efectivo".into()],
            },
            StaticEntry {
                content: "Para cancelar tu suscripción entra a Configuración.".into(),
                source_location: "faq/cuenta.md".into(),
                keywords: vec![],
            },
        ])
    }

    #[tokio::test]
    async fn matching_terms_score_passages() {
        let results = source().query("¿Cómo pago con OXXO?", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_location, "faq/pagos.md");
        assert!(results[0].score > 0.0 && results[0].score <= 1.0);
    }

    #[tokio::test]
    async fn keywords_count_as_matches() {
        let results = source().query("efectivo", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn unrelated_query_finds_nothing() {
        assert!(source().query("weather forecast", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_source_is_not_configured() {
        let err = DisabledKnowledgeSource::new("off").query("q", 1).await.unwrap_err();
        assert!(matches!(err, RetrievalError::NotConfigured(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_file_is_not_configured() {
        let err = StaticKnowledgeSource::from_file(Path::new("/nonexistent/kb.json"))
            .err()
            .unwrap();
        assert!(matches!(err, RetrievalError::NotConfigured(_)));
    }
}
