//! HTTP knowledge source.
//!
//! Sends `POST {endpoint}/knowledge-bases/{id}/retrieve` with
//! `{"query": ..., "max_results": ...}` and expects
//! `{"results": [{"content", "score", "source_location", "metadata"}]}`.
//! One call is one attempt; retries belong to the retriever.

use async_trait::async_trait;
use ferrodesk_core::error::RetrievalError;
use ferrodesk_core::knowledge::{KnowledgeSource, RetrievalResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpKnowledgeSource {
    endpoint: String,
    knowledge_base_id: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpKnowledgeSource {
    pub fn new(
        endpoint: impl Into<String>,
        knowledge_base_id: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build knowledge HTTP client, using defaults: {e}");
                reqwest::Client::new()
            });

        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            knowledge_base_id: knowledge_base_id.into(),
            api_key,
            client,
        }
    }

    pub fn retrieve_url(&self) -> String {
        format!(
            "{}/knowledge-bases/{}/retrieve",
            self.endpoint, self.knowledge_base_id
        )
    }
}

#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    results: Vec<ApiResult>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(alias = "text")]
    content: String,
    #[serde(default)]
    score: f32,
    #[serde(default, alias = "location")]
    source_location: Option<String>,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl From<ApiResult> for RetrievalResult {
    fn from(r: ApiResult) -> Self {
        RetrievalResult {
            content: r.content,
            score: r.score,
            source_location: r.source_location.unwrap_or_else(|| "N/A".into()),
            metadata: r.metadata,
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> RetrievalError {
    if e.is_timeout() {
        RetrievalError::Timeout(e.to_string())
    } else {
        RetrievalError::Network(e.to_string())
    }
}

fn parse_results(body: &str) -> Result<Vec<RetrievalResult>, RetrievalError> {
    let parsed: RetrieveResponse = serde_json::from_str(body)
        .map_err(|e| RetrievalError::InvalidResponse(format!("Failed to parse retrieve response: {e}")))?;
    Ok(parsed.results.into_iter().map(RetrievalResult::from).collect())
}

#[async_trait]
impl KnowledgeSource for HttpKnowledgeSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn query(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let url = self.retrieve_url();
        debug!(url = %url, max_results, "Querying knowledge base");

        let mut request = self
            .client
            .post(&url)
            .json(&RetrieveRequest { query, max_results });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(RetrievalError::AuthenticationFailed(format!(
                "knowledge base rejected credentials (status {status})"
            )));
        }

        let body = response.text().await.map_err(map_transport_error)?;
        if !(200..300).contains(&status) {
            return Err(RetrievalError::ApiError {
                status_code: status,
                message: body,
            });
        }

        parse_results(&body)
    }
}
