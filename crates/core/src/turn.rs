//! Turns and bounded session history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How many turns a session retains.
pub const DEFAULT_HISTORY_CAP: usize = 10;

/// One user/agent exchange. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,

    pub actor_id: String,

    pub session_id: String,

    pub user_message: String,

    pub agent_response: String,

    /// Escalation decision, tools used, ...
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Turn {
    pub fn new(
        actor_id: impl Into<String>,
        session_id: impl Into<String>,
        user_message: impl Into<String>,
        agent_response: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            actor_id: actor_id.into(),
            session_id: session_id.into(),
            user_message: user_message.into(),
            agent_response: agent_response.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The escalation decision recorded for this turn, if any.
    pub fn escalated(&self) -> Option<bool> {
        self.metadata.get("need_to_escalate").and_then(|v| v.as_bool())
    }
}

/// Ordered turns of a single session, capped FIFO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistory {
    session_id: String,
    cap: usize,
    turns: VecDeque<Turn>,
}

impl SessionHistory {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::with_cap(session_id, DEFAULT_HISTORY_CAP)
    }

    /// A cap of zero is treated as one.
    pub fn with_cap(session_id: impl Into<String>, cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            session_id: session_id.into(),
            cap,
            turns: VecDeque::with_capacity(cap),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Append a turn, evicting the oldest ones past the cap.
    /// Returns how many turns were evicted.
    pub fn push(&mut self, turn: Turn) -> usize {
        self.turns.push_back(turn);
        let mut evicted = 0;
        while self.turns.len() > self.cap {
            self.turns.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// All retained turns, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(i: usize) -> Turn {
        Turn::new("customer_1", "s-1", format!("question {i}"), format!("answer {i}"))
    }

    #[test]
    fn history_never_exceeds_cap_and_keeps_last_in_order() {
        for n in [0usize, 1, 9, 10, 11, 12, 25, 100] {
            let mut history = SessionHistory::new("s-1");
            for i in 0..n {
                history.push(turn(i));
            }
            assert!(history.len() <= DEFAULT_HISTORY_CAP);
            let expected: Vec<String> = (n.saturating_sub(DEFAULT_HISTORY_CAP)..n)
                .map(|i| format!("question {i}"))
                .collect();
            let actual: Vec<String> = history.iter().map(|t| t.user_message.clone()).collect();
            assert_eq!(actual, expected, "after {n} appends");
        }
    }

    #[test]
    fn push_reports_evictions() {
        let mut history = SessionHistory::with_cap("s-1", 2);
        assert_eq!(history.push(turn(0)), 0);
        assert_eq!(history.push(turn(1)), 0);
        assert_eq!(history.push(turn(2)), 1);
        assert_eq!(history.iter().next().unwrap().user_message, "question 1");
    }

    #[test]
    fn recent_returns_tail_chronologically() {
        let mut history = SessionHistory::new("s-1");
        for i in 0..5 {
            history.push(turn(i));
        }
        let recent = history.recent(3);
        let msgs: Vec<_> = recent.iter().map(|t| t.user_message.as_str()).collect();
        assert_eq!(msgs, vec!["question 2", "question 3", "question 4"]);
        assert_eq!(history.recent(50).len(), 5);
    }

    #[test]
    fn zero_cap_is_clamped() {
        let history = SessionHistory::with_cap("s-1", 0);
        assert_eq!(history.cap(), 1);
    }

    #[test]
    fn escalation_metadata_roundtrips() {
        let t = turn(0).with_metadata("need_to_escalate", serde_json::json!(true));
        assert_eq!(t.escalated(), Some(true));
        assert_eq!(turn(1).escalated(), None);
    }
}
