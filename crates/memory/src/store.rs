//! The Memory Store Adapter.
//!
//! Wraps an optional [`MemoryBackend`] and makes every failure non-fatal:
//! writes report `false`, reads come back empty. A store built without a
//! backend behaves as if memory were switched off.

use ferrodesk_core::error::MemoryError;
use ferrodesk_core::memory::{LongTermMemory, MemoryBackend, MemoryEvent, MemoryRecord, NamespaceKind};
use ferrodesk_core::turn::Turn;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use crate::namespace::{ActorIds, Namespaces};

/// Records requested from each namespace per read.
pub const DEFAULT_TOP_K: usize = 10;

pub struct MemoryStore {
    backend: Option<Arc<dyn MemoryBackend>>,
    namespaces: Namespaces,
    actor_ids: ActorIds,
    query: String,
    top_k: usize,
    timeout: Duration,
}

impl MemoryStore {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self {
            backend: Some(backend),
            namespaces: Namespaces::default(),
            actor_ids: ActorIds::default(),
            query: "user information".into(),
            top_k: DEFAULT_TOP_K,
            timeout: Duration::from_secs(10),
        }
    }

    /// A store with no backend: appends return `false`, reads are empty.
    pub fn unavailable() -> Self {
        Self {
            backend: None,
            ..Self::new(Arc::new(crate::NoopMemory))
        }
    }

    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_actor_ids(mut self, actor_ids: ActorIds) -> Self {
        self.actor_ids = actor_ids;
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.as_ref().map(|b| b.name()).unwrap_or("unavailable")
    }

    pub fn actor_ids(&self) -> &ActorIds {
        &self.actor_ids
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Actor id for a raw user id.
    pub fn actor_id(&self, user_id: &str) -> String {
        self.actor_ids.actor_id(user_id)
    }

    async fn call<T, F>(&self, op: &'static str, fut: F) -> Result<T, MemoryError>
    where
        F: Future<Output = Result<T, MemoryError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout_secs = self.timeout.as_secs(), "Memory call timed out");
                Err(MemoryError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    /// Append one finished turn to the short-term log.
    ///
    /// Returns `true` only if the backend accepted it.
    pub async fn append_turn(&self, turn: &Turn) -> bool {
        let Some(backend) = &self.backend else {
            debug!("Memory unavailable, turn not logged");
            return false;
        };

        let event = MemoryEvent::from_turn(turn);
        match self.call("create_event", backend.create_event(event)).await {
            Ok(event_id) => {
                debug!(event_id = %event_id, session_id = %turn.session_id, "Turn logged to memory");
                true
            }
            Err(e) => {
                warn!(session_id = %turn.session_id, "Failed to log turn to memory: {e}");
                false
            }
        }
    }

    /// Read one namespace for `actor_id`.
    ///
    /// Session-scoped namespaces need `session_id`; without one the read is
    /// skipped. Any failure yields an empty list.
    pub async fn retrieve(
        &self,
        actor_id: &str,
        kind: NamespaceKind,
        session_id: Option<&str>,
    ) -> Vec<MemoryRecord> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };

        let namespace = match self.namespaces.resolve(kind, actor_id, session_id) {
            Ok(ns) => ns,
            Err(e) => {
                debug!(namespace = %kind, "Skipping memory read: {e}");
                return Vec::new();
            }
        };

        match self
            .call(
                "retrieve_records",
                backend.retrieve_records(&namespace, &self.query, self.top_k),
            )
            .await
        {
            Ok(records) => {
                debug!(namespace = %namespace, count = records.len(), "Memory records retrieved");
                records
            }
            Err(e) => {
                warn!(namespace = %namespace, "Memory read failed: {e}");
                Vec::new()
            }
        }
    }

    /// Read all three namespaces concurrently.
    pub async fn retrieve_all(&self, actor_id: &str, session_id: Option<&str>) -> LongTermMemory {
        let (preferences, summaries, semantic) = futures::join!(
            self.retrieve(actor_id, NamespaceKind::UserPreferences, session_id),
            self.retrieve(actor_id, NamespaceKind::ConversationSummaries, session_id),
            self.retrieve(actor_id, NamespaceKind::SemanticMemory, session_id),
        );
        LongTermMemory {
            preferences,
            summaries,
            semantic,
        }
    }

    /// Most recent logged events for a session, oldest first. Empty on failure.
    pub async fn list_events(&self, actor_id: &str, session_id: &str, limit: usize) -> Vec<MemoryEvent> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };
        match self
            .call("list_events", backend.list_events(actor_id, session_id, limit))
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(session_id, "Listing memory events failed: {e}");
                Vec::new()
            }
        }
    }

    /// Insert a long-term record. Unlike reads this reports errors, since
    /// it is only used by operators seeding a store.
    pub async fn put_record(
        &self,
        actor_id: &str,
        kind: NamespaceKind,
        session_id: Option<&str>,
        content: impl Into<String>,
    ) -> Result<String, MemoryError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| MemoryError::Unavailable("no memory backend configured".into()))?;
        let template = self.namespaces.template(kind);
        let namespace = template.resolve(actor_id, session_id)?;
        let record = MemoryRecord::new(content, &template.strategy_id).with_score(1.0);
        self.call("put_record", backend.put_record(&namespace, record))
            .await?;
        Ok(namespace)
    }
}
