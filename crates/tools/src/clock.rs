//! Current time tool.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use ferrodesk_core::error::ToolError;
use ferrodesk_core::tool::{Tool, ToolContext, ToolResult};

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time (UTC). Use it for questions about dates, deadlines or business hours."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let now = Utc::now();
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: now.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            data: Some(serde_json::json!({
                "iso": now.to_rfc3339_opts(SecondsFormat::Secs, true),
            })),
        })
    }
}
