//! Knowledge retrieval for ferrodesk.
//!
//! A [`KnowledgeRetriever`] wraps any `ferrodesk_core::KnowledgeSource` and
//! turns it into a call that never fails: results are filtered by score,
//! ranked, truncated, and transport problems come back as
//! `RetrievalOutcome::Unavailable` after a bounded number of retries.
//!
//! Sources:
//! - [`HttpKnowledgeSource`]: a remote retrieval endpoint
//! - [`StaticKnowledgeSource`]: passages loaded from a JSON file
//! - [`DisabledKnowledgeSource`]: always unavailable

pub mod http;
pub mod retriever;
pub mod static_source;

pub use http::HttpKnowledgeSource;
pub use retriever::{KnowledgeRetriever, RetryPolicy, rank_results};
pub use static_source::{DisabledKnowledgeSource, StaticEntry, StaticKnowledgeSource};

use ferrodesk_config::KnowledgeSettings;
use ferrodesk_core::knowledge::KnowledgeSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the retriever described by the knowledge settings.
///
/// Misconfiguration never aborts startup: the retriever falls back to a
/// disabled source and every search degrades to "unavailable".
pub fn build_from_config(settings: &KnowledgeSettings) -> KnowledgeRetriever {
    let source: Arc<dyn KnowledgeSource> = match settings.backend.as_str() {
        "http" => match (&settings.endpoint, &settings.knowledge_base_id) {
            (Some(endpoint), Some(kb_id)) => {
                info!(endpoint = %endpoint, knowledge_base_id = %kb_id, "Using HTTP knowledge source");
                Arc::new(HttpKnowledgeSource::new(
                    endpoint,
                    kb_id,
                    settings.api_key.clone(),
                    Duration::from_secs(settings.timeout_secs),
                ))
            }
            _ => {
                warn!("Knowledge endpoint or knowledge_base_id missing; knowledge search is disabled");
                Arc::new(DisabledKnowledgeSource::new(
                    "knowledge endpoint or knowledge_base_id not configured",
                ))
            }
        },
        "static" => match &settings.static_path {
            Some(path) => match StaticKnowledgeSource::from_file(path) {
                Ok(source) => {
                    info!(path = %path.display(), passages = source.len(), "Using static knowledge source");
                    Arc::new(source)
                }
                Err(e) => {
                    warn!(path = %path.display(), "Failed to load static knowledge: {e}");
                    Arc::new(DisabledKnowledgeSource::new(e.to_string()))
                }
            },
            None => {
                warn!("knowledge.static_path not set; knowledge search is disabled");
                Arc::new(DisabledKnowledgeSource::new("static_path not configured"))
            }
        },
        _ => Arc::new(DisabledKnowledgeSource::new("knowledge search disabled")),
    };

    retriever_for(source, settings)
}

/// A retriever over `source` with the timeout and retry policy from `settings`.
pub fn retriever_for(source: Arc<dyn KnowledgeSource>, settings: &KnowledgeSettings) -> KnowledgeRetriever {
    KnowledgeRetriever::new(source)
        .with_attempt_timeout(Duration::from_secs(settings.timeout_secs))
        .with_retry_policy(RetryPolicy {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.backoff_base_ms),
            max_delay: Duration::from_millis(settings.backoff_max_ms),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn http_without_endpoint_is_unavailable() {
        let retriever = build_from_config(&KnowledgeSettings::default());
        assert_eq!(retriever.source_name(), "disabled");
        let outcome = retriever.retrieve("OXXO", 5, 0.1).await;
        assert!(outcome.is_unavailable());
    }

    #[tokio::test]
    async fn static_backend_loads_passages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(
            &path,
            r#"[{"content": "Puedes pagar en OXXO con tu referencia de pago.", "source_location": "faq/pagos.md"}]"#,
        )
        .unwrap();

        let settings = KnowledgeSettings {
            backend: "static".into(),
            static_path: Some(path),
            ..KnowledgeSettings::default()
        };
        let retriever = build_from_config(&settings);
        assert_eq!(retriever.source_name(), "static");
        let outcome = retriever.retrieve("pagar OXXO", 5, 0.1).await;
        assert_eq!(outcome.results().len(), 1);
    }
}
