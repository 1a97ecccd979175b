//! Memory recall tool: lets the model re-read the customer's long-term memory.

use async_trait::async_trait;
use ferrodesk_core::error::ToolError;
use ferrodesk_core::memory::NamespaceKind;
use ferrodesk_core::tool::{Tool, ToolContext, ToolResult};
use ferrodesk_memory::MemoryStore;
use std::sync::Arc;

pub struct RecallMemoriesTool {
    memory: Arc<MemoryStore>,
}

impl RecallMemoriesTool {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for RecallMemoriesTool {
    fn name(&self) -> &str {
        "recall_memories"
    }

    fn description(&self) -> &str {
        "Read what is remembered about the current customer: preferences, summaries of this \
         conversation, and facts from earlier conversations."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "namespace": {
                    "type": "string",
                    "enum": ["preferences", "summaries", "semantic"],
                    "description": "Only read one kind of memory (default: all)"
                }
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let kinds: Vec<NamespaceKind> = match arguments["namespace"].as_str() {
            Some(name) => vec![name.parse().map_err(ToolError::InvalidArguments)?],
            None => NamespaceKind::ALL.to_vec(),
        };

        let session = Some(ctx.session_id.as_str()).filter(|s| !s.is_empty());
        let mut sections = Vec::new();
        let mut data = serde_json::Map::new();
        for kind in kinds {
            let records = self.memory.retrieve(&ctx.actor_id, kind, session).await;
            let contents: Vec<String> = records.into_iter().map(|r| r.content).collect();
            if !contents.is_empty() {
                let lines: Vec<String> = contents.iter().map(|c| format!("- {c}")).collect();
                sections.push(format!("{kind}:\n{}", lines.join("\n")));
            }
            data.insert(kind.as_str().to_string(), serde_json::json!(contents));
        }

        let output = if sections.is_empty() {
            "No stored memories for this customer.".to_string()
        } else {
            sections.join("\n\n")
        };

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data: Some(serde_json::Value::Object(data)),
        })
    }
}
