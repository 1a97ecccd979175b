//! Built-in customer-service tools.
//!
//! - `search_knowledge`: knowledge base lookup with degraded-mode messages
//! - `escalate_to_human`: handoff to a human queue
//! - `get_current_time`: the clock
//! - `recall_memories`: re-read the customer's long-term memory

pub mod clock;
pub mod escalate;
pub mod recall_memories;
pub mod search_knowledge;

pub use clock::CurrentTimeTool;
pub use escalate::EscalateToHumanTool;
pub use recall_memories::RecallMemoriesTool;
pub use search_knowledge::SearchKnowledgeTool;

use ferrodesk_config::KnowledgeSettings;
use ferrodesk_core::event::EventBus;
use ferrodesk_core::tool::ToolRegistry;
use ferrodesk_knowledge::KnowledgeRetriever;
use ferrodesk_memory::MemoryStore;
use std::sync::Arc;

/// What the built-in tools need from the rest of the service.
#[derive(Clone)]
pub struct ToolDeps {
    pub retriever: Arc<KnowledgeRetriever>,
    pub memory: Arc<MemoryStore>,
    pub events: Arc<EventBus>,
    pub support_contact: String,
}

/// Registry with every built-in tool.
pub fn default_registry(deps: ToolDeps, knowledge: &KnowledgeSettings) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SearchKnowledgeTool::new(
        deps.retriever,
        knowledge.max_results,
        knowledge.min_score,
    )));
    registry.register(Box::new(EscalateToHumanTool::new(deps.events, deps.support_contact)));
    registry.register(Box::new(CurrentTimeTool));
    registry.register(Box::new(RecallMemoriesTool::new(deps.memory)));
    registry
}
