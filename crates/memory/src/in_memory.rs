//! In-memory backend, for tests and single-process deployments.

use async_trait::async_trait;
use ferrodesk_core::error::MemoryError;
use ferrodesk_core::memory::{MemoryBackend, MemoryEvent, MemoryRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps events and records in process memory. Nothing survives a restart.
pub struct InMemoryBackend {
    events: Arc<RwLock<Vec<MemoryEvent>>>,
    records: Arc<RwLock<HashMap<String, Vec<MemoryRecord>>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_event(&self, event: MemoryEvent) -> Result<String, MemoryError> {
        let id = event.event_id.clone();
        self.events.write().await.push(event);
        Ok(id)
    }

    async fn list_events(
        &self,
        actor_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEvent>, MemoryError> {
        let events = self.events.read().await;
        Ok(crate::latest_events(
            events
                .iter()
                .filter(|e| e.actor_id == actor_id && e.session_id == session_id)
                .cloned(),
            limit,
        ))
    }

    async fn retrieve_records(
        &self,
        namespace: &str,
        _query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        let found = records.get(namespace).cloned().unwrap_or_default();
        Ok(crate::rank_records(found, top_k))
    }

    async fn put_record(&self, namespace: &str, record: MemoryRecord) -> Result<(), MemoryError> {
        self.records
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .push(record);
        Ok(())
    }
}
