//! Identity: the assistant persona and its output contract.
//!
//! The system prompt is built from three parts:
//!
//! 1. **Persona**: agent name, the product it supports, tone
//! 2. **Rules**: tool usage, degradation and escalation policy
//! 3. **Output contract**: the single JSON object every reply must be
//!
//! Deployments may replace the persona and rules with a prompt file; the
//! output contract is always appended so the orchestrator can parse replies.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// The JSON contract appended to every system prompt.
pub const OUTPUT_CONTRACT: &str = r#"## Response format
Reply with exactly one JSON object and nothing else: no prose before or after it, no code fences.
{
  "response": "<your reply to the customer>",
  "tools_used": ["<name of every tool you called>"],
  "need_to_escalate": "true" | "false"
}"#;

const ESCALATION_RULES: &str = "## When to escalate
Set \"need_to_escalate\" to \"true\" and call escalate_to_human when any of these holds:
- The customer explicitly asks for a human agent.
- The request needs an authorization or decision outside your scope (refunds, exceptions, account changes you cannot perform).
- The knowledge base is unavailable and the question cannot be answered without it.
- The conversation is stuck on conflicting facts (dates, amounts, statuses) that clarification has not resolved.
Otherwise set it to \"false\".";

/// The assistant persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// The assistant's name as presented to customers
    pub agent_name: String,

    /// What the assistant supports (e.g. "the subscription platform")
    pub product: String,

    /// Where customers are sent when automation cannot help
    pub support_contact: String,

    /// Replaces the built-in persona and rules when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_override: Option<String>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            agent_name: "Max".into(),
            product: "the subscription platform".into(),
            support_contact: "support@example.com".into(),
            prompt_override: None,
        }
    }
}

impl Identity {
    /// Load a prompt override from `path`. A missing or empty file keeps the
    /// built-in prompt.
    pub fn with_prompt_file(mut self, path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) if !content.trim().is_empty() => {
                debug!(path = %path.display(), "Loaded system prompt override");
                self.prompt_override = Some(content.trim().to_string());
            }
            Ok(_) => {
                warn!(path = %path.display(), "System prompt file is empty, using built-in prompt");
            }
            Err(e) => {
                warn!(path = %path.display(), "Failed to read system prompt file: {e}");
            }
        }
        self
    }

    /// Build the system prompt, listing the tools available this turn.
    pub fn system_prompt(&self, tool_names: &[&str]) -> String {
        let mut out = match &self.prompt_override {
            Some(custom) => custom.clone(),
            None => self.builtin_prompt(),
        };

        if !tool_names.is_empty() {
            out.push_str("\n\n## Available tools\n");
            for name in tool_names {
                out.push_str("- ");
                out.push_str(name);
                out.push('\n');
            }
        }

        out.push_str("\n\n");
        out.push_str(OUTPUT_CONTRACT);
        out
    }

    fn builtin_prompt(&self) -> String {
        format!(
            "You are {name}, the customer service agent for {product}.\n\
             Reply in the customer's language with a friendly, professional and concise tone.\n\
             \n\
             ## Before answering\n\
             - Use the customer context you are given (preferences, summaries, recent turns).\n\
             - Use search_knowledge for any question about {product}; paraphrase what it returns.\n\
             - Never invent information. If the knowledge base has no answer, say so.\n\
             - If the knowledge base cannot be reached, tell the customer you cannot access current information right now.\n\
             - Politely decline questions unrelated to {product}.\n\
             - When automation cannot help, point the customer to {contact}.\n\
             \n\
             {rules}",
            name = self.agent_name,
            product = self.product,
            contact = self.support_contact,
            rules = ESCALATION_RULES,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_prompt_contains_contract_and_rules() {
        let prompt = Identity::default().system_prompt(&["search_knowledge", "escalate_to_human"]);
        assert!(prompt.starts_with("You are Max"));
        assert!(prompt.contains("need_to_escalate"));
        assert!(prompt.contains("explicitly asks for a human"));
        assert!(prompt.contains("- search_knowledge\n"));
        assert!(prompt.ends_with(OUTPUT_CONTRACT));
    }

    #[test]
    fn override_keeps_output_contract() {
        let identity = Identity {
            prompt_override: Some("Custom persona.".into()),
            ..Identity::default()
        };
        let prompt = identity.system_prompt(&[]);
        assert!(prompt.starts_with("Custom persona."));
        assert!(!prompt.contains("Available tools"));
        assert!(prompt.contains(OUTPUT_CONTRACT));
    }

    #[test]
    fn missing_prompt_file_keeps_builtin() {
        let identity = Identity::default().with_prompt_file(Path::new("/nonexistent/prompt.md"));
        assert!(identity.prompt_override.is_none());
    }
}
