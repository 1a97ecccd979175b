//! Domain event system: decoupled observation of the turn lifecycle.
//!
//! The orchestrator publishes an event at every state transition. Other
//! components (gateway logging, CLI output) can subscribe without being
//! wired into the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A validated customer message entered the orchestrator
    TurnReceived {
        session_id: String,
        actor_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Context was assembled for the turn
    ContextBuilt {
        session_id: String,
        history_turns: usize,
        memory_snippets: usize,
        context_chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// The completion step produced a parsed reply
    TurnCompleted {
        session_id: String,
        tools_used: Vec<String>,
        need_to_escalate: bool,
        timestamp: DateTime<Utc>,
    },

    /// The turn was written to session history and the event log
    TurnPersisted {
        session_id: String,
        event_logged: bool,
        timestamp: DateTime<Utc>,
    },

    /// The turn ended in the failed state
    TurnFailed {
        session_id: String,
        error_type: String,
        timestamp: DateTime<Utc>,
    },

    /// A human handoff was requested through the escalation tool
    EscalationRequested {
        escalation_id: String,
        actor_id: String,
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn session_id(&self) -> &str {
        match self {
            DomainEvent::TurnReceived { session_id, .. }
            | DomainEvent::ContextBuilt { session_id, .. }
            | DomainEvent::TurnCompleted { session_id, .. }
            | DomainEvent::TurnPersisted { session_id, .. }
            | DomainEvent::TurnFailed { session_id, .. }
            | DomainEvent::EscalationRequested { session_id, .. } => session_id,
        }
    }
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
