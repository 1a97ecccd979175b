//! Provider router: builds and selects the completion provider from config.

use async_trait::async_trait;
use ferrodesk_core::error::ProviderError;
use ferrodesk_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes completion requests to a named provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Stands in for a provider whose credentials are missing.
///
/// Startup still succeeds; every completion fails with `NotConfigured`,
/// which the orchestrator reports as a completion failure.
pub struct UnconfiguredProvider {
    name: String,
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Provider for UnconfiguredProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(false)
    }
}

/// Build the router for the configured provider.
pub fn build_from_config(config: &ferrodesk_config::AppConfig) -> ProviderRouter {
    let settings = &config.provider;
    let mut router = ProviderRouter::new(&settings.name);

    let base_url = settings
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(&settings.name));

    let provider: Arc<dyn Provider> = match (&settings.api_key, requires_api_key(&settings.name)) {
        (Some(key), _) => Arc::new(
            OpenAiCompatProvider::new(&settings.name, &base_url, key)
                .with_timeout(settings.timeout_secs),
        ),
        (None, false) => Arc::new(
            OpenAiCompatProvider::new(&settings.name, &base_url, "")
                .with_timeout(settings.timeout_secs),
        ),
        (None, true) => {
            warn!(provider = %settings.name, "No API key configured; completions will fail until one is set");
            Arc::new(UnconfiguredProvider::new(
                &settings.name,
                format!("no API key for provider '{}'", settings.name),
            ))
        }
    };

    router.register(settings.name.clone(), provider);
    router
}

/// Local runtimes accept any key.
fn requires_api_key(provider_name: &str) -> bool {
    !matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrodesk_core::message::Message;

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));

        assert!(router.get("openai").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
        assert_eq!(router.list(), vec!["openai"]);
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[tokio::test]
    async fn missing_key_builds_unconfigured_provider() {
        let config = ferrodesk_config::AppConfig::default();
        let router = build_from_config(&config);
        let provider = router.default().unwrap();

        let err = provider
            .complete(ProviderRequest {
                model: "gpt-4o-mini".into(),
                messages: vec![Message::user("hola")],
                temperature: 0.3,
                max_tokens: None,
                tools: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(!provider.health_check().await.unwrap());
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut config = ferrodesk_config::AppConfig::default();
        config.provider.name = "ollama".into();
        let router = build_from_config(&config);
        assert_eq!(router.default().unwrap().name(), "ollama");
    }
}
