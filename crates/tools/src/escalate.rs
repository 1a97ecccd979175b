//! Human escalation tool.

use async_trait::async_trait;
use chrono::Utc;
use ferrodesk_core::error::ToolError;
use ferrodesk_core::event::{DomainEvent, EventBus};
use ferrodesk_core::tool::{Tool, ToolContext, ToolResult};
use std::sync::Arc;
use tracing::info;

/// Hands the conversation to a human queue.
///
/// There is no ticketing integration: the handoff is announced on the
/// [`EventBus`] as `EscalationRequested`, which is what an operator
/// integration subscribes to.
pub struct EscalateToHumanTool {
    events: Arc<EventBus>,
    support_contact: String,
}

impl EscalateToHumanTool {
    pub fn new(events: Arc<EventBus>, support_contact: impl Into<String>) -> Self {
        Self {
            events,
            support_contact: support_contact.into(),
        }
    }
}

#[async_trait]
impl Tool for EscalateToHumanTool {
    fn name(&self) -> &str {
        "escalate_to_human"
    }

    fn description(&self) -> &str {
        "Transfer the conversation to a human agent. Use when the customer asks for a person, \
         when the request needs authorization you do not have, or when you cannot answer \
         without the knowledge base."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Why the conversation is being escalated"
                },
                "customer_info": {
                    "type": "string",
                    "description": "Anything the human agent should know up front"
                }
            },
            "required": ["reason"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let reason = arguments["reason"]
            .as_str()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'reason' argument".into()))?
            .to_string();
        let customer_info = arguments["customer_info"].as_str().unwrap_or_default();

        let now = Utc::now();
        let escalation_id = format!("ESC-{}", now.format("%Y%m%d%H%M%S"));

        info!(
            escalation_id = %escalation_id,
            session_id = %ctx.session_id,
            actor_id = %ctx.actor_id,
            has_customer_info = !customer_info.is_empty(),
            "Escalation requested"
        );
        self.events.publish(DomainEvent::EscalationRequested {
            escalation_id: escalation_id.clone(),
            actor_id: ctx.actor_id.clone(),
            session_id: ctx.session_id.clone(),
            reason: reason.clone(),
            timestamp: now,
        });

        let output = format!(
            "Escalating to a human agent.\n\
             Escalation ID: {escalation_id}\n\
             Reason: {reason}\n\
             Estimated wait: 3-5 minutes.\n\
             A human agent will join shortly. If the customer has to leave, they can quote \
             the escalation ID to pick the conversation back up.\n\
             Direct contact: {}",
            self.support_contact
        );

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data: Some(serde_json::json!({
                "escalation_id": escalation_id,
                "reason": reason,
                "estimated_wait_minutes": "3-5",
            })),
        })
    }
}
