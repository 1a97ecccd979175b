//! Memory trait: tiered customer memory.
//!
//! Memory is partitioned per actor into three long-term namespaces plus a
//! short-term event log:
//! - `user_preferences`: long-lived facts about a customer
//! - `conversation_summaries`: session-scoped distillations
//! - `semantic_memory`: cross-session topical knowledge
//! - events: the raw turns, appended as they happen
//!
//! Long-term records are produced by an external extraction process and are
//! only read here; [`MemoryBackend::put_record`] exists so deployments and
//! tests can seed them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::error::MemoryError;
use crate::turn::Turn;

/// The long-term namespaces a customer's memory is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceKind {
    UserPreferences,
    ConversationSummaries,
    SemanticMemory,
}

impl NamespaceKind {
    /// All kinds, in the order they are rendered into context.
    pub const ALL: [NamespaceKind; 3] = [
        NamespaceKind::UserPreferences,
        NamespaceKind::ConversationSummaries,
        NamespaceKind::SemanticMemory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceKind::UserPreferences => "user_preferences",
            NamespaceKind::ConversationSummaries => "conversation_summaries",
            NamespaceKind::SemanticMemory => "semantic_memory",
        }
    }

    /// Summaries are scoped to a single session; the other kinds are not.
    pub fn is_session_scoped(&self) -> bool {
        matches!(self, NamespaceKind::ConversationSummaries)
    }
}

impl std::str::FromStr for NamespaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user_preferences" | "preferences" => Ok(NamespaceKind::UserPreferences),
            "conversation_summaries" | "summaries" => Ok(NamespaceKind::ConversationSummaries),
            "semantic_memory" | "semantic" => Ok(NamespaceKind::SemanticMemory),
            other => Err(format!("unknown memory namespace '{other}'")),
        }
    }
}

impl std::fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A long-term memory record read back from a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub content: String,

    /// Relevance score reported by the store
    #[serde(default)]
    pub score: f32,

    /// Which extraction strategy produced this record
    #[serde(default)]
    pub strategy_id: String,

    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(content: impl Into<String>, strategy_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            score: 0.0,
            strategy_id: strategy_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }
}

/// Long-term records read for one turn, one list per namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTermMemory {
    pub preferences: Vec<MemoryRecord>,
    pub summaries: Vec<MemoryRecord>,
    pub semantic: Vec<MemoryRecord>,
}

impl LongTermMemory {
    pub fn get(&self, kind: NamespaceKind) -> &[MemoryRecord] {
        match kind {
            NamespaceKind::UserPreferences => &self.preferences,
            NamespaceKind::ConversationSummaries => &self.summaries,
            NamespaceKind::SemanticMemory => &self.semantic,
        }
    }

    pub fn set(&mut self, kind: NamespaceKind, records: Vec<MemoryRecord>) {
        match kind {
            NamespaceKind::UserPreferences => self.preferences = records,
            NamespaceKind::ConversationSummaries => self.summaries = records,
            NamespaceKind::SemanticMemory => self.semantic = records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.preferences.is_empty() && self.summaries.is_empty() && self.semantic.is_empty()
    }

    pub fn total(&self) -> usize {
        self.preferences.len() + self.summaries.len() + self.semantic.len()
    }
}

/// Who said a line in a short-term event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub role: EventRole,
    pub content: String,
}

/// A short-term event: one turn as written to the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub event_id: String,

    pub actor_id: String,

    pub session_id: String,

    pub timestamp: DateTime<Utc>,

    /// Conversational payload, user line first
    pub messages: Vec<EventMessage>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl MemoryEvent {
    /// Build the event that records `turn`.
    pub fn from_turn(turn: &Turn) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            actor_id: turn.actor_id.clone(),
            session_id: turn.session_id.clone(),
            timestamp: turn.timestamp,
            messages: vec![
                EventMessage {
                    role: EventRole::User,
                    content: turn.user_message.clone(),
                },
                EventMessage {
                    role: EventRole::Assistant,
                    content: turn.agent_response.clone(),
                },
            ],
            metadata: turn.metadata.clone(),
        }
    }
}

/// The storage seam behind the Memory Store Adapter.
///
/// Backends report failures as `MemoryError`; the adapter in
/// `ferrodesk-memory` is what turns those into empty/false results.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Append a short-term event. Returns the stored event id.
    async fn create_event(&self, event: MemoryEvent) -> std::result::Result<String, MemoryError>;

    /// Most recent events for an actor/session, oldest first.
    async fn list_events(
        &self,
        actor_id: &str,
        session_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<MemoryEvent>, MemoryError>;

    /// Query a resolved namespace. Records come back most relevant first.
    async fn retrieve_records(
        &self,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<MemoryRecord>, MemoryError>;

    /// Insert a long-term record into a resolved namespace.
    async fn put_record(
        &self,
        namespace: &str,
        record: MemoryRecord,
    ) -> std::result::Result<(), MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_kind_parses_short_and_long_names() {
        assert_eq!("preferences".parse::<NamespaceKind>().unwrap(), NamespaceKind::UserPreferences);
        assert_eq!(
            "conversation_summaries".parse::<NamespaceKind>().unwrap(),
            NamespaceKind::ConversationSummaries
        );
        assert!("episodic".parse::<NamespaceKind>().is_err());
    }

    #[test]
    fn only_summaries_are_session_scoped() {
        let scoped: Vec<_> = NamespaceKind::ALL
            .iter()
            .filter(|k| k.is_session_scoped())
            .collect();
        assert_eq!(scoped, vec![&NamespaceKind::ConversationSummaries]);
    }

    #[test]
    fn event_from_turn_keeps_user_line_first() {
        let turn = Turn::new("customer_1", "s-1", "hola", "¡Hola! ¿En qué te ayudo?");
        let event = MemoryEvent::from_turn(&turn);
        assert_eq!(event.actor_id, "customer_1");
        assert_eq!(event.messages.len(), 2);
        assert_eq!(event.messages[0].role, EventRole::User);
        assert_eq!(event.messages[1].content, "¡Hola! ¿En qué te ayudo?");
    }

    #[test]
    fn long_term_memory_get_and_set() {
        let mut memory = LongTermMemory::default();
        assert!(memory.is_empty());
        memory.set(NamespaceKind::SemanticMemory, vec![MemoryRecord::new("likes OXXO", "sem")]);
        assert_eq!(memory.get(NamespaceKind::SemanticMemory).len(), 1);
        assert!(memory.get(NamespaceKind::UserPreferences).is_empty());
        assert_eq!(memory.total(), 1);
    }

    #[test]
    fn event_role_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&EventRole::Assistant).unwrap(), "\"ASSISTANT\"");
    }
}
