//! Actor ids and namespace path resolution.

use ferrodesk_config::{NamespaceConfig, NamespacesConfig};
use ferrodesk_core::error::MemoryError;
use ferrodesk_core::memory::NamespaceKind;

/// Maps raw user ids to actor ids and back.
///
/// An actor id is always `prefix + user_id`, so the mapping is reversible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorIds {
    prefix: String,
}

impl ActorIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn actor_id(&self, user_id: &str) -> String {
        format!("{}{}", self.prefix, user_id)
    }

    /// Recover the user id, or `None` if `actor_id` was not built with this prefix.
    pub fn user_id<'a>(&self, actor_id: &'a str) -> Option<&'a str> {
        actor_id.strip_prefix(self.prefix.as_str())
    }
}

impl Default for ActorIds {
    fn default() -> Self {
        Self::new("customer_")
    }
}

/// A namespace path template for one extraction strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTemplate {
    pub strategy_id: String,
    pub template: String,
}

impl NamespaceTemplate {
    pub fn new(strategy_id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            template: template.into(),
        }
    }

    /// Fill in the placeholders in a single pass over the template.
    ///
    /// Substituted values are escaped and never scanned again, so an id
    /// containing `{`, `}` or `/` stays inside its own path segment. Fails
    /// if a placeholder has no value, e.g. a session-scoped template
    /// resolved without a session id.
    pub fn resolve(&self, actor_id: &str, session_id: Option<&str>) -> Result<String, MemoryError> {
        let session_id = session_id.filter(|s| !s.trim().is_empty());
        let mut path = String::with_capacity(self.template.len() + actor_id.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('{') {
            path.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                return Err(self.unresolved(after));
            };
            let placeholder = &after[..end];
            let value = match placeholder {
                "strategy_id" => Some(self.strategy_id.as_str()),
                "actor_id" => Some(actor_id).filter(|a| !a.trim().is_empty()),
                "session_id" => session_id,
                _ => None,
            };
            let Some(value) = value else {
                return Err(self.unresolved(placeholder));
            };
            path.push_str(&escape_segment(value));
            rest = &after[end + 1..];
        }

        path.push_str(rest);
        Ok(path)
    }

    fn unresolved(&self, placeholder: &str) -> MemoryError {
        MemoryError::UnresolvedNamespace {
            template: self.template.clone(),
            placeholder: placeholder.to_string(),
        }
    }
}

/// Percent-escape the characters that carry meaning in a namespace path.
fn escape_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '{' => out.push_str("%7B"),
            '}' => out.push_str("%7D"),
            _ => out.push(c),
        }
    }
    out
}

impl From<&NamespaceConfig> for NamespaceTemplate {
    fn from(config: &NamespaceConfig) -> Self {
        Self::new(&config.strategy_id, &config.template)
    }
}

/// The three configured namespace templates.
#[derive(Debug, Clone)]
pub struct Namespaces {
    preferences: NamespaceTemplate,
    summaries: NamespaceTemplate,
    semantic: NamespaceTemplate,
}

impl Namespaces {
    pub fn from_config(config: &NamespacesConfig) -> Self {
        Self {
            preferences: (&config.user_preferences).into(),
            summaries: (&config.conversation_summaries).into(),
            semantic: (&config.semantic_memory).into(),
        }
    }

    pub fn template(&self, kind: NamespaceKind) -> &NamespaceTemplate {
        match kind {
            NamespaceKind::UserPreferences => &self.preferences,
            NamespaceKind::ConversationSummaries => &self.summaries,
            NamespaceKind::SemanticMemory => &self.semantic,
        }
    }

    pub fn resolve(
        &self,
        kind: NamespaceKind,
        actor_id: &str,
        session_id: Option<&str>,
    ) -> Result<String, MemoryError> {
        self.template(kind).resolve(actor_id, session_id)
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::from_config(&NamespacesConfig::default())
    }
}
