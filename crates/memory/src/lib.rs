//! Customer memory for FerroDesk.
//!
//! - [`MemoryStore`]: the adapter the orchestrator talks to
//! - [`SessionStore`]: in-process per-session turn history
//! - backends: `none`, `in_memory`, `file` and (with the `sqlite` feature) `sqlite`

pub mod namespace;
pub mod store;
pub mod session;
pub mod noop;
pub mod in_memory;
pub mod file_backend;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use namespace::{ActorIds, NamespaceTemplate, Namespaces};
pub use store::MemoryStore;
pub use session::SessionStore;
pub use noop::NoopMemory;
pub use in_memory::InMemoryBackend;
pub use file_backend::FileBackend;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

use ferrodesk_config::MemorySettings;
use ferrodesk_core::error::MemoryError;
use ferrodesk_core::memory::{MemoryBackend, MemoryEvent, MemoryRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Best first, then newest first, at most `top_k`.
pub(crate) fn rank_records(mut records: Vec<MemoryRecord>, top_k: usize) -> Vec<MemoryRecord> {
    records.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    records.truncate(top_k);
    records
}

/// The last `limit` events of an already-filtered, chronological stream.
pub(crate) fn latest_events(events: impl Iterator<Item = MemoryEvent>, limit: usize) -> Vec<MemoryEvent> {
    let mut all: Vec<MemoryEvent> = events.collect();
    let skip = all.len().saturating_sub(limit);
    all.drain(..skip);
    all
}

/// Open the configured backend.
///
/// `none` yields `Ok(None)`. Errors opening a real backend are returned so
/// the caller can decide whether to continue without memory.
pub async fn open_backend(settings: &MemorySettings) -> Result<Option<Arc<dyn MemoryBackend>>, MemoryError> {
    let store_name = settings.memory_id.clone().unwrap_or_else(|| "default".into());
    let backend: Arc<dyn MemoryBackend> = match settings.backend.as_str() {
        "none" | "off" | "disabled" => return Ok(None),
        "in_memory" | "memory" => Arc::new(InMemoryBackend::new()),
        "file" => Arc::new(FileBackend::new(settings.data_dir().join(&store_name))),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let dir = settings.data_dir();
            std::fs::create_dir_all(&dir)
                .map_err(|e| MemoryError::Storage(format!("Failed to create {}: {e}", dir.display())))?;
            let url = format!("sqlite://{}", dir.join(format!("{store_name}.db")).display());
            Arc::new(SqliteBackend::new(&url).await?)
        }
        other => {
            return Err(MemoryError::Unavailable(format!("unknown memory backend '{other}'")));
        }
    };
    Ok(Some(backend))
}

/// Build the adapter from config. Never fails: a backend that cannot be
/// opened leaves memory unavailable and the service running.
pub async fn build_from_config(settings: &MemorySettings) -> MemoryStore {
    let store = match open_backend(settings).await {
        Ok(Some(backend)) => {
            info!(backend = backend.name(), memory_id = ?settings.memory_id, "Memory store ready");
            MemoryStore::new(backend)
        }
        Ok(None) => {
            info!("Memory disabled");
            MemoryStore::unavailable()
        }
        Err(e) => {
            warn!("Memory store unavailable, continuing without memory: {e}");
            MemoryStore::unavailable()
        }
    };

    store
        .with_namespaces(Namespaces::from_config(&settings.namespaces))
        .with_actor_ids(ActorIds::new(&settings.actor_prefix))
        .with_query(&settings.retrieval_query)
        .with_timeout(Duration::from_secs(settings.timeout_secs.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrodesk_core::memory::NamespaceKind;

    fn settings(backend: &str, dir: &std::path::Path) -> MemorySettings {
        MemorySettings {
            backend: backend.into(),
            memory_id: Some("test-store".into()),
            data_dir: Some(dir.to_path_buf()),
            ..MemorySettings::default()
        }
    }

    #[tokio::test]
    async fn none_backend_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let store = build_from_config(&settings("none", tmp.path())).await;
        assert!(!store.is_available());
    }

    #[tokio::test]
    async fn unknown_backend_degrades_to_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let store = build_from_config(&settings("redis", tmp.path())).await;
        assert!(!store.is_available());
    }

    #[tokio::test]
    async fn file_backend_uses_memory_id_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = build_from_config(&settings("file", tmp.path())).await;
        assert_eq!(store.backend_name(), "file");
        store
            .put_record("customer_1", NamespaceKind::SemanticMemory, None, "x")
            .await
            .unwrap();
        assert!(tmp.path().join("test-store").join("records.jsonl").exists());
    }

    #[tokio::test]
    async fn config_prefix_and_query_are_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = settings("in_memory", tmp.path());
        s.actor_prefix = "cliente_".into();
        let store = build_from_config(&s).await;
        assert_eq!(store.actor_id("9"), "cliente_9");
    }

    #[test]
    fn rank_records_breaks_ties_by_recency() {
        let older = MemoryRecord::new("older", "s");
        let mut newer = MemoryRecord::new("newer", "s");
        newer.created_at = older.created_at + chrono::Duration::seconds(5);
        let ranked = rank_records(vec![older, newer], 5);
        assert_eq!(ranked[0].content, "newer");
    }
}
