//! Knowledge source trait: the external semantic index.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::RetrievalError;

/// One passage returned by a knowledge query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,

    pub score: f32,

    /// Where the passage came from (document URI, page, ...)
    #[serde(default)]
    pub source_location: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RetrievalResult {
    pub fn new(content: impl Into<String>, score: f32, source_location: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            score,
            source_location: source_location.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// The result of a retrieval that never raises.
///
/// "Nothing matched" and "the source failed" are different variants so
/// callers can word their fallback differently, but neither is an error.
#[derive(Debug, Clone)]
pub enum RetrievalOutcome {
    /// Ranked results, possibly empty.
    Found(Vec<RetrievalResult>),
    /// The knowledge source could not be reached or rejected the query.
    Unavailable(RetrievalError),
}

impl RetrievalOutcome {
    pub fn results(&self) -> &[RetrievalResult] {
        match self {
            RetrievalOutcome::Found(results) => results,
            RetrievalOutcome::Unavailable(_) => &[],
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, RetrievalOutcome::Unavailable(_))
    }

    pub fn error(&self) -> Option<&RetrievalError> {
        match self {
            RetrievalOutcome::Unavailable(e) => Some(e),
            RetrievalOutcome::Found(_) => None,
        }
    }
}

/// A semantic index that can be queried for passages.
///
/// Implementations return raw candidates; filtering, ranking and
/// truncation happen in the retriever that wraps them.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    fn name(&self) -> &str;

    async fn query(
        &self,
        query: &str,
        max_results: usize,
    ) -> std::result::Result<Vec<RetrievalResult>, RetrievalError>;
}
