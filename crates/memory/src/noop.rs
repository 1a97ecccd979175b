//! No-op memory backend: disables persistent memory entirely.

use async_trait::async_trait;
use ferrodesk_core::error::MemoryError;
use ferrodesk_core::memory::{MemoryBackend, MemoryEvent, MemoryRecord};

/// Accepts writes and forgets them. Reads are always empty.
pub struct NoopMemory;

#[async_trait]
impl MemoryBackend for NoopMemory {
    fn name(&self) -> &str {
        "none"
    }

    async fn create_event(&self, event: MemoryEvent) -> Result<String, MemoryError> {
        Ok(event.event_id)
    }

    async fn list_events(&self, _actor: &str, _session: &str, _limit: usize) -> Result<Vec<MemoryEvent>, MemoryError> {
        Ok(Vec::new())
    }

    async fn retrieve_records(&self, _ns: &str, _query: &str, _top_k: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(Vec::new())
    }

    async fn put_record(&self, _ns: &str, _record: MemoryRecord) -> Result<(), MemoryError> {
        Ok(())
    }
}
