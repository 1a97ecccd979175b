//! In-process session histories.
//!
//! Each session gets its own lock, so turns of one session run one at a time
//! while different sessions proceed in parallel.

use ferrodesk_core::turn::{DEFAULT_HISTORY_CAP, SessionHistory};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

struct Slot {
    history: Arc<Mutex<SessionHistory>>,
    last_used: u64,
}

struct Inner {
    slots: HashMap<String, Slot>,
    clock: u64,
}

/// Holds one [`SessionHistory`] per session id.
///
/// When more than `max_sessions` sessions are live, the least recently used
/// idle one is dropped. A session whose history is locked or awaited by a
/// turn is never evicted, so the store can briefly exceed `max_sessions`
/// while every session is busy.
pub struct SessionStore {
    inner: Mutex<Inner>,
    history_cap: usize,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(history_cap: usize, max_sessions: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                clock: 0,
            }),
            history_cap: history_cap.max(1),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn history_cap(&self) -> usize {
        self.history_cap
    }

    /// Lock a session's history, creating it if needed.
    ///
    /// Hold the guard for the whole turn to serialize turns of one session.
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<SessionHistory> {
        let history = {
            let mut inner = self.inner.lock().await;
            inner.clock += 1;
            let now = inner.clock;

            if !inner.slots.contains_key(session_id) && inner.slots.len() >= self.max_sessions {
                // Only the map holds an idle slot's history.
                let oldest = inner
                    .slots
                    .iter()
                    .filter(|(_, slot)| Arc::strong_count(&slot.history) == 1)
                    .min_by_key(|(_, slot)| slot.last_used)
                    .map(|(id, _)| id.clone());
                if let Some(oldest) = oldest {
                    inner.slots.remove(&oldest);
                    debug!(session_id = %oldest, "Evicted least recently used session");
                }
            }

            let cap = self.history_cap;
            let slot = inner.slots.entry(session_id.to_string()).or_insert_with(|| Slot {
                history: Arc::new(Mutex::new(SessionHistory::with_cap(session_id, cap))),
                last_used: now,
            });
            slot.last_used = now;
            slot.history.clone()
        };
        history.lock_owned().await
    }

    /// A copy of the session's history, if the session is known.
    pub async fn snapshot(&self, session_id: &str) -> Option<SessionHistory> {
        let history = {
            let inner = self.inner.lock().await;
            inner.slots.get(session_id)?.history.clone()
        };
        let guard = history.lock().await;
        Some(guard.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP, 1000)
    }
}
