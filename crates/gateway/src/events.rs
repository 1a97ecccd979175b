//! Logs domain events published by the orchestrator.

use ferrodesk_core::event::{DomainEvent, EventBus};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::TurnReceived {
            session_id, actor_id, ..
        } => debug!(session_id = %session_id, actor_id = %actor_id, "event: turn received"),
        DomainEvent::ContextBuilt {
            session_id,
            history_turns,
            memory_snippets,
            context_chars,
            ..
        } => debug!(
            session_id = %session_id,
            history_turns,
            memory_snippets,
            context_chars,
            "event: context built"
        ),
        DomainEvent::TurnCompleted {
            session_id,
            tools_used,
            need_to_escalate,
            ..
        } => info!(
            session_id = %session_id,
            tools = ?tools_used,
            need_to_escalate,
            "event: turn completed"
        ),
        DomainEvent::TurnPersisted {
            session_id,
            event_logged,
            ..
        } => debug!(session_id = %session_id, event_logged, "event: turn persisted"),
        DomainEvent::TurnFailed {
            session_id, error_type, ..
        } => warn!(session_id = %session_id, error_type = %error_type, "event: turn failed"),
        DomainEvent::EscalationRequested {
            escalation_id,
            session_id,
            reason,
            ..
        } => info!(
            escalation_id = %escalation_id,
            session_id = %session_id,
            reason = %reason,
            "event: escalation requested"
        ),
    }
}

/// Log every event on `events` until the bus is dropped.
pub fn spawn_event_logger(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event logger fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
