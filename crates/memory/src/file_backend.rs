//! File-based memory backend: persistent JSON-lines storage.
//!
//! A store lives in one directory holding two append-only files:
//! - `events.jsonl`: one `MemoryEvent` per line
//! - `records.jsonl`: one `{"namespace": ..., "record": {...}}` per line
//!
//! Both are loaded into memory on creation; writes append a line and update
//! the in-memory copy. Corrupted lines are skipped with a warning.

use async_trait::async_trait;
use ferrodesk_core::error::MemoryError;
use ferrodesk_core::memory::{MemoryBackend, MemoryEvent, MemoryRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const EVENTS_FILE: &str = "events.jsonl";
const RECORDS_FILE: &str = "records.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    namespace: String,
    record: MemoryRecord,
}

pub struct FileBackend {
    dir: PathBuf,
    events: Arc<RwLock<Vec<MemoryEvent>>>,
    records: Arc<RwLock<Vec<StoredRecord>>>,
}

impl FileBackend {
    /// Open (or lazily create) the store in `dir`.
    pub fn new(dir: PathBuf) -> Self {
        let events: Vec<MemoryEvent> = load_lines(&dir.join(EVENTS_FILE));
        let records: Vec<StoredRecord> = load_lines(&dir.join(RECORDS_FILE));
        debug!(
            dir = %dir.display(),
            events = events.len(),
            records = records.len(),
            "File memory backend loaded"
        );
        Self {
            dir,
            events: Arc::new(RwLock::new(events)),
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append_line<T: Serialize>(&self, file: &str, value: &T) -> Result<(), MemoryError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| MemoryError::Storage(format!("Failed to create memory directory: {e}")))?;

        let mut line = serde_json::to_string(value)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize memory line: {e}")))?;
        line.push('\n');

        let mut handle = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))
            .map_err(|e| MemoryError::Storage(format!("Failed to open {file}: {e}")))?;
        handle
            .write_all(line.as_bytes())
            .map_err(|e| MemoryError::Storage(format!("Failed to write {file}: {e}")))
    }
}

fn load_lines<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Skipping corrupted memory line");
                None
            }
        })
        .collect()
}

#[async_trait]
impl MemoryBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn create_event(&self, event: MemoryEvent) -> Result<String, MemoryError> {
        let mut events = self.events.write().await;
        self.append_line(EVENTS_FILE, &event)?;
        let id = event.event_id.clone();
        events.push(event);
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
        let found = records
            .iter()
            .filter(|r| r.namespace == namespace)
            .map(|r| r.record.clone())
            .collect();
        Ok(crate::rank_records(found, top_k))
    }

    async fn put_record(&self, namespace: &str, record: MemoryRecord) -> Result<(), MemoryError> {
        let stored = StoredRecord {
            namespace: namespace.to_string(),
            record,
        };
        let mut records = self.records.write().await;
        self.append_line(RECORDS_FILE, &stored)?;
        records.push(stored);
        Ok(())
    }
}
