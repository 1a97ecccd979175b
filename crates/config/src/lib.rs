//! Configuration loading, validation, and management for ferrodesk.
//!
//! Loads configuration from `~/.ferrodesk/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ferrodesk/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Service name reported in response metadata
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub memory: MemorySettings,

    #[serde(default)]
    pub knowledge: KnowledgeSettings,

    /// Caps applied when assembling the prompt context
    #[serde(default)]
    pub context: ContextSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub identity: IdentityConfig,
}

fn default_service_name() -> String {
    "customer-service".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

// ── Completion provider ───────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider name: "openai", "openrouter", "ollama", ...
    #[serde(default = "default_provider")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the provider's default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_provider_timeout() -> u64 {
    120
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: default_provider(),
            api_key: None,
            base_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("name", &self.name)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ── Memory store ──────────────────────────────────────────────────────────

/// One long-term namespace: which strategy fills it and how its path is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    pub strategy_id: String,

    /// Path template with `{strategy_id}`, `{actor_id}` and optionally
    /// `{session_id}` placeholders
    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespacesConfig {
    #[serde(default = "default_preferences_ns")]
    pub user_preferences: NamespaceConfig,

    #[serde(default = "default_summaries_ns")]
    pub conversation_summaries: NamespaceConfig,

    #[serde(default = "default_semantic_ns")]
    pub semantic_memory: NamespaceConfig,
}

fn default_preferences_ns() -> NamespaceConfig {
    NamespaceConfig {
        strategy_id: "preference_strategy".into(),
        template: "/strategies/{strategy_id}/actors/{actor_id}".into(),
    }
}
fn default_summaries_ns() -> NamespaceConfig {
    NamespaceConfig {
        strategy_id: "summary_strategy".into(),
        template: "/strategies/{strategy_id}/actors/{actor_id}/sessions/{session_id}".into(),
    }
}
fn default_semantic_ns() -> NamespaceConfig {
    NamespaceConfig {
        strategy_id: "semantic_strategy".into(),
        template: "/strategies/{strategy_id}/actors/{actor_id}".into(),
    }
}

impl Default for NamespacesConfig {
    fn default() -> Self {
        Self {
            user_preferences: default_preferences_ns(),
            conversation_summaries: default_summaries_ns(),
            semantic_memory: default_semantic_ns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    /// "none", "in_memory", "file" or "sqlite"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Identifier of the memory store; names the file/database on disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    /// Where file and sqlite backends keep their data (defaults to ~/.ferrodesk/memory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Prefix that turns a raw user id into an actor id
    #[serde(default = "default_actor_prefix")]
    pub actor_prefix: String,

    /// Query sent to every namespace read
    #[serde(default = "default_retrieval_query")]
    pub retrieval_query: String,

    #[serde(default = "default_memory_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub namespaces: NamespacesConfig,
}

fn default_memory_backend() -> String {
    "in_memory".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_actor_prefix() -> String {
    "customer_".into()
}
fn default_retrieval_query() -> String {
    "user information".into()
}
fn default_memory_timeout() -> u64 {
    10
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            memory_id: None,
            region: default_region(),
            data_dir: None,
            actor_prefix: default_actor_prefix(),
            retrieval_query: default_retrieval_query(),
            timeout_secs: default_memory_timeout(),
            namespaces: NamespacesConfig::default(),
        }
    }
}

impl MemorySettings {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("memory"))
    }
}

// ── Knowledge source ──────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct KnowledgeSettings {
    /// "http", "static" or "none"
    #[serde(default = "default_knowledge_backend")]
    pub backend: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,

    /// Base URL of the retrieval service (http backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// JSON file of passages (static backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_path: Option<PathBuf>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_min_score")]
    pub min_score: f32,

    #[serde(default = "default_knowledge_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_knowledge_backend() -> String {
    "http".into()
}
fn default_max_results() -> usize {
    15
}
fn default_min_score() -> f32 {
    0.1
}
fn default_knowledge_timeout() -> u64 {
    120
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    8_000
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            backend: default_knowledge_backend(),
            knowledge_base_id: None,
            endpoint: None,
            api_key: None,
            static_path: None,
            max_results: default_max_results(),
            min_score: default_min_score(),
            timeout_secs: default_knowledge_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl std::fmt::Debug for KnowledgeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeSettings")
            .field("backend", &self.backend)
            .field("knowledge_base_id", &self.knowledge_base_id)
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("static_path", &self.static_path)
            .field("max_results", &self.max_results)
            .field("min_score", &self.min_score)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("backoff_max_ms", &self.backoff_max_ms)
            .finish()
    }
}

// ── Context assembly ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Prior turns injected into the prompt
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    #[serde(default = "default_max_preferences")]
    pub max_preferences: usize,

    #[serde(default = "default_max_summaries")]
    pub max_summaries: usize,

    #[serde(default = "default_max_semantic")]
    pub max_semantic: usize,

    /// Per-snippet character cap for memory items
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// Character cap for prior agent responses
    #[serde(default = "default_response_chars")]
    pub response_chars: usize,
}

fn default_history_turns() -> usize {
    3
}
fn default_max_preferences() -> usize {
    3
}
fn default_max_summaries() -> usize {
    2
}
fn default_max_semantic() -> usize {
    2
}
fn default_snippet_chars() -> usize {
    800
}
fn default_response_chars() -> usize {
    100
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            history_turns: default_history_turns(),
            max_preferences: default_max_preferences(),
            max_summaries: default_max_summaries(),
            max_semantic: default_max_semantic(),
            snippet_chars: default_snippet_chars(),
            response_chars: default_response_chars(),
        }
    }
}

// ── Sessions and orchestration ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Turns retained per session
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Sessions kept in memory before the least recently used is dropped
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_history_cap() -> usize {
    10
}
fn default_max_sessions() -> usize {
    1000
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Provider rounds allowed per turn while the model keeps calling tools
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    /// Upper bound on a single completion round
    #[serde(default = "default_completion_timeout")]
    pub completion_timeout_secs: u64,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_tool_iterations() -> usize {
    5
}
fn default_completion_timeout() -> u64 {
    180
}
fn default_tool_timeout() -> u64 {
    150
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            completion_timeout_secs: default_completion_timeout(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

// ── Gateway and identity ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Permissive CORS for browser clients
    #[serde(default = "default_true")]
    pub cors: bool,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
            cors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    #[serde(default = "default_product")]
    pub product: String,

    #[serde(default = "default_support_contact")]
    pub support_contact: String,

    /// Markdown file replacing the built-in persona
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,
}

fn default_agent_name() -> String {
    "Max".into()
}
fn default_product() -> String {
    "the subscription platform".into()
}
fn default_support_contact() -> String {
    "support@example.com".into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            product: default_product(),
            support_contact: default_support_contact(),
            prompt_file: None,
        }
    }
}

const MEMORY_BACKENDS: &[&str] = &["none", "in_memory", "file", "sqlite"];
const KNOWLEDGE_BACKENDS: &[&str] = &["none", "http", "static"];

impl AppConfig {
    /// Load configuration from the default path (~/.ferrodesk/config.toml),
    /// then apply `FERRODESK_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Takes the lookup as a function so tests can supply a fixed map.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("FERRODESK_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("OPENROUTER_API_KEY"));
        }
        if let Some(v) = lookup("FERRODESK_PROVIDER") {
            self.provider.name = v;
        }
        if let Some(v) = lookup("FERRODESK_MODEL") {
            self.provider.model = v;
        }
        if let Some(v) = lookup("FERRODESK_BASE_URL") {
            self.provider.base_url = Some(v);
        }
        if let Some(v) = lookup("FERRODESK_MEMORY_BACKEND") {
            self.memory.backend = v;
        }
        if let Some(v) = lookup("FERRODESK_MEMORY_ID") {
            self.memory.memory_id = Some(v);
        }
        if let Some(v) = lookup("FERRODESK_REGION") {
            self.memory.region = v;
        }
        if let Some(v) = lookup("FERRODESK_KNOWLEDGE_BACKEND") {
            self.knowledge.backend = v;
        }
        if let Some(v) = lookup("FERRODESK_KNOWLEDGE_BASE_ID") {
            self.knowledge.knowledge_base_id = Some(v);
        }
        if let Some(v) = lookup("FERRODESK_KNOWLEDGE_ENDPOINT") {
            self.knowledge.endpoint = Some(v);
        }
        if let Some(v) = lookup("FERRODESK_KNOWLEDGE_API_KEY") {
            self.knowledge.api_key = Some(v);
        }
        if let Some(v) = lookup("FERRODESK_SERVICE_NAME") {
            self.service_name = v;
        }
        if let Some(port) = lookup("FERRODESK_GATEWAY_PORT").and_then(|v| v.parse().ok()) {
            self.gateway.port = port;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ferrodesk")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !MEMORY_BACKENDS.contains(&self.memory.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "memory.backend must be one of {MEMORY_BACKENDS:?}, got '{}'",
                self.memory.backend
            )));
        }

        if self.memory.actor_prefix.is_empty() {
            return Err(ConfigError::ValidationError(
                "memory.actor_prefix cannot be empty".into(),
            ));
        }

        let ns = &self.memory.namespaces;
        for (name, cfg) in [
            ("user_preferences", &ns.user_preferences),
            ("conversation_summaries", &ns.conversation_summaries),
            ("semantic_memory", &ns.semantic_memory),
        ] {
            if !cfg.template.contains("{actor_id}") {
                return Err(ConfigError::ValidationError(format!(
                    "memory.namespaces.{name}.template must contain {{actor_id}}"
                )));
            }
            if cfg.strategy_id.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "memory.namespaces.{name}.strategy_id cannot be empty"
                )));
            }
        }

        if !KNOWLEDGE_BACKENDS.contains(&self.knowledge.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "knowledge.backend must be one of {KNOWLEDGE_BACKENDS:?}, got '{}'",
                self.knowledge.backend
            )));
        }

        if self.knowledge.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.max_results must be > 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.knowledge.min_score) {
            return Err(ConfigError::ValidationError(
                "knowledge.min_score must be between 0.0 and 1.0".into(),
            ));
        }

        if self.knowledge.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.max_attempts must be at least 1".into(),
            ));
        }

        if self.session.history_cap == 0 {
            return Err(ConfigError::ValidationError(
                "session.history_cap must be > 0".into(),
            ));
        }

        if self.orchestrator.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_tool_iterations must be > 0".into(),
            ));
        }

        if self.orchestrator.tool_timeout_secs == 0 || self.knowledge.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.tool_timeout_secs and knowledge.timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// A copy safe to print: every secret is replaced by a marker.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.provider.api_key.is_some() {
            config.provider.api_key = Some("[REDACTED]".into());
        }
        if config.knowledge.api_key.is_some() {
            config.knowledge.api_key = Some("[REDACTED]".into());
        }
        config
    }

    /// Generate a default config TOML string (for `config --init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            provider: ProviderSettings::default(),
            memory: MemorySettings::default(),
            knowledge: KnowledgeSettings::default(),
            context: ContextSettings::default(),
            session: SessionSettings::default(),
            orchestrator: OrchestratorSettings::default(),
            gateway: GatewayConfig::default(),
            identity: IdentityConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
