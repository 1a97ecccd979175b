//! Context assembly: the text block sent to the model for one turn.
//!
//! Built from up to three parts, in this order:
//!
//! | Part | Source | Cap |
//! |------|--------|-----|
//! | Long-term memory | preferences, summaries, semantic | 3 / 2 / 2 snippets |
//! | Recent conversation | session history | last 3 turns |
//! | Current message | the request | never trimmed |
//!
//! With no memory and no history the context is the bare message.
//!
//! # Determinism
//!
//! Output depends only on the arguments: no clock, no randomness, and
//! records are rendered in the order the store returned them.

use crate::context::token;
use ferrodesk_config::ContextSettings;
use ferrodesk_core::memory::{LongTermMemory, MemoryRecord, NamespaceKind};
use ferrodesk_core::turn::Turn;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Types ─────────────────────────────────────────────────────────────────

/// Caps applied while assembling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLimits {
    /// Prior turns rendered, most recent last
    pub history_turns: usize,
    pub max_preferences: usize,
    pub max_summaries: usize,
    pub max_semantic: usize,
    /// Characters kept from each memory snippet and prior user line
    pub snippet_chars: usize,
    /// Characters kept from each prior agent reply
    pub response_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            history_turns: 3,
            max_preferences: 3,
            max_summaries: 2,
            max_semantic: 2,
            snippet_chars: 800,
            response_chars: 100,
        }
    }
}

impl From<&ContextSettings> for ContextLimits {
    fn from(s: &ContextSettings) -> Self {
        Self {
            history_turns: s.history_turns,
            max_preferences: s.max_preferences,
            max_summaries: s.max_summaries,
            max_semantic: s.max_semantic,
            snippet_chars: s.snippet_chars,
            response_chars: s.response_chars,
        }
    }
}

impl ContextLimits {
    pub fn namespace_cap(&self, kind: NamespaceKind) -> usize {
        match kind {
            NamespaceKind::UserPreferences => self.max_preferences,
            NamespaceKind::ConversationSummaries => self.max_summaries,
            NamespaceKind::SemanticMemory => self.max_semantic,
        }
    }
}

/// The assembled context plus what went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    pub stats: ContextStats,
}

impl AssembledContext {
    /// True when neither memory nor history contributed.
    pub fn is_bare(&self) -> bool {
        self.stats.memory_snippets() == 0 && self.stats.history_turns == 0
    }
}

/// Per-part counts for one assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextStats {
    pub preferences: usize,
    pub summaries: usize,
    pub semantic: usize,
    pub history_turns: usize,
    /// Items left out because a cap was hit
    pub dropped: usize,
    pub chars: usize,
    /// Rough token estimate of `text`
    pub estimated_tokens: usize,
}

impl ContextStats {
    pub fn memory_snippets(&self) -> usize {
        self.preferences + self.summaries + self.semantic
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// Stateless; create one and reuse it.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    limits: ContextLimits,
}

fn section_label(kind: NamespaceKind) -> &'static str {
    match kind {
        NamespaceKind::UserPreferences => "[Customer preferences]",
        NamespaceKind::ConversationSummaries => "[Summary of this conversation so far]",
        NamespaceKind::SemanticMemory => "[What we know from earlier conversations]",
    }
}

const HISTORY_LABEL: &str = "[Recent conversation]";
const MESSAGE_LABEL: &str = "[Current message]";

/// Collapse whitespace runs (newlines included) to one space and cut to
/// `max_chars` characters, marking the cut with "...".
pub fn clean_snippet(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > max_chars {
        let cut: String = collapsed.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    } else {
        collapsed
    }
}

impl ContextAssembler {
    pub fn new(limits: ContextLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ContextLimits {
        &self.limits
    }

    /// Assemble the context for `message`.
    ///
    /// `history` is the session's turns, oldest first; only the last
    /// `history_turns` are used. `user_id` is never written into the text.
    pub fn build_context(
        &self,
        message: &str,
        user_id: &str,
        history: &[Turn],
        memory: &LongTermMemory,
    ) -> AssembledContext {
        let mut stats = ContextStats::default();
        let mut sections: Vec<String> = Vec::new();

        // ── Long-term memory ───────────────────────────────────────────────
        for kind in NamespaceKind::ALL {
            let records = memory.get(kind);
            let (section, included) = self.render_namespace(kind, records);
            stats.dropped += records.len() - included;
            match kind {
                NamespaceKind::UserPreferences => stats.preferences = included,
                NamespaceKind::ConversationSummaries => stats.summaries = included,
                NamespaceKind::SemanticMemory => stats.semantic = included,
            }
            if let Some(section) = section {
                sections.push(section);
            }
        }

        // ── Recent conversation ────────────────────────────────────────────
        let skip = history.len().saturating_sub(self.limits.history_turns);
        let recent = &history[skip..];
        stats.dropped += skip;
        stats.history_turns = recent.len();
        if !recent.is_empty() {
            let mut section = String::from(HISTORY_LABEL);
            for turn in recent {
                section.push_str("\nuser: ");
                section.push_str(&clean_snippet(&turn.user_message, self.limits.snippet_chars));
                section.push_str("\nagent: ");
                section.push_str(&clean_snippet(&turn.agent_response, self.limits.response_chars));
            }
            sections.push(section);
        }

        // ── Current message ────────────────────────────────────────────────
        let text = if sections.is_empty() {
            message.to_string()
        } else {
            format!("{}\n\n{MESSAGE_LABEL}\n{message}", sections.join("\n\n"))
        };

        stats.chars = text.chars().count();
        stats.estimated_tokens = token::estimate_tokens(&text);
        debug!(
            user_id,
            memory_snippets = stats.memory_snippets(),
            history_turns = stats.history_turns,
            dropped = stats.dropped,
            chars = stats.chars,
            "Context assembled"
        );

        AssembledContext { text, stats }
    }

    fn render_namespace(&self, kind: NamespaceKind, records: &[MemoryRecord]) -> (Option<String>, usize) {
        let cap = self.limits.namespace_cap(kind);
        let lines: Vec<String> = records
            .iter()
            .map(|r| clean_snippet(&r.content, self.limits.snippet_chars))
            .filter(|s| !s.is_empty())
            .take(cap)
            .map(|s| format!("- {s}"))
            .collect();

        if lines.is_empty() {
            return (None, 0);
        }
        let included = lines.len();
        (Some(format!("{}\n{}", section_label(kind), lines.join("\n"))), included)
    }

    /// Upper bound on the assembled length, in characters, for a message of
    /// `message_chars` characters. Independent of how much history or memory
    /// exists.
    pub fn max_context_chars(&self, message_chars: usize) -> usize {
        let l = &self.limits;
        let labels: usize = NamespaceKind::ALL
            .iter()
            .map(|k| section_label(*k).chars().count() + 2)
            .sum::<usize>()
            + HISTORY_LABEL.chars().count()
            + MESSAGE_LABEL.chars().count()
            + 8;
        // "- " + snippet + "..." + newline per memory line
        let memory = (l.max_preferences + l.max_summaries + l.max_semantic) * (l.snippet_chars + 6);
        // "\nuser: " + line + "...", "\nagent: " + reply + "..."
        let history = l.history_turns * (l.snippet_chars + l.response_chars + 21);
        labels + memory + history + message_chars
    }
}
