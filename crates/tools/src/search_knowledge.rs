//! Knowledge search tool.
//!
//! Wraps the [`KnowledgeRetriever`] so the model can look up passages. A
//! source that cannot be reached is reported to the model as a message, not
//! as a tool error, so it can answer in degraded mode or escalate.

use async_trait::async_trait;
use ferrodesk_core::error::ToolError;
use ferrodesk_core::knowledge::{RetrievalOutcome, RetrievalResult};
use ferrodesk_core::tool::{Tool, ToolContext, ToolResult};
use ferrodesk_knowledge::KnowledgeRetriever;
use std::sync::Arc;
use tracing::{info, warn};

/// Passages shown to the model per search.
pub const SHOWN_RESULTS: usize = 3;

/// Characters kept from each shown passage.
pub const PREVIEW_CHARS: usize = 800;

pub struct SearchKnowledgeTool {
    retriever: Arc<KnowledgeRetriever>,
    max_results: usize,
    min_score: f32,
}

impl SearchKnowledgeTool {
    pub fn new(retriever: Arc<KnowledgeRetriever>, max_results: usize, min_score: f32) -> Self {
        Self {
            retriever,
            max_results,
            min_score,
        }
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let cut: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

fn format_results(query: &str, results: &[RetrievalResult]) -> String {
    let total = results.len();
    let mut out = format!("Found {total} knowledge base result(s) for: \"{query}\"\n");
    for (i, result) in results.iter().take(SHOWN_RESULTS).enumerate() {
        out.push_str(&format!(
            "\n[Result {}] (relevance: {:.2}, source: {})\n{}\n",
            i + 1,
            result.score,
            result.source_location,
            preview(&result.content)
        ));
    }
    if total > SHOWN_RESULTS {
        out.push_str(&format!(
            "\n({} more result(s) matched. A more specific question would narrow them down.)",
            total - SHOWN_RESULTS
        ));
    }
    out
}

#[async_trait]
impl Tool for SearchKnowledgeTool {
    fn name(&self) -> &str {
        "search_knowledge"
    }

    fn description(&self) -> &str {
        "Search the product knowledge base for policies, prices, payment methods and procedures. \
         Use it before answering any factual question about the service."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look up, phrased as a search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let outcome = self
            .retriever
            .retrieve(query, self.max_results, self.min_score)
            .await;

        let (output, status, results) = match &outcome {
            RetrievalOutcome::Found(results) if results.is_empty() => (
                format!(
                    "No information found in the knowledge base for: \"{query}\". \
                     Ask the customer for more detail or offer a human agent."
                ),
                "empty",
                Vec::new(),
            ),
            RetrievalOutcome::Found(results) => (format_results(query, results), "ok", results.clone()),
            RetrievalOutcome::Unavailable(e) => {
                warn!(session_id = %ctx.session_id, "Knowledge search degraded: {e}");
                (
                    "I cannot access the knowledge base right now. Answer only what you know \
                     for certain, and escalate to a human agent if the question needs it."
                        .to_string(),
                    "unavailable",
                    Vec::new(),
                )
            }
        };

        info!(
            session_id = %ctx.session_id,
            status,
            results = results.len(),
            "search_knowledge complete"
        );

        let shown: Vec<_> = results
            .iter()
            .take(SHOWN_RESULTS)
            .map(|r| {
                serde_json::json!({
                    "content": preview(&r.content),
                    "score": r.score,
                    "source_location": r.source_location,
                })
            })
            .collect();

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data: Some(serde_json::json!({
                "status": status,
                "total": results.len(),
                "results": shown,
            })),
        })
    }
}
