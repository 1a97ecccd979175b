//! Wiring an [`Orchestrator`] from configuration.
//!
//! Every collaborator is built exactly once here and injected; nothing
//! below this point reads configuration or environment on its own.

use crate::context::{ContextAssembler, ContextLimits};
use crate::orchestrator::Orchestrator;
use ferrodesk_config::{AppConfig, IdentityConfig};
use ferrodesk_core::event::EventBus;
use ferrodesk_core::identity::Identity;
use ferrodesk_core::provider::Provider;
use ferrodesk_memory::SessionStore;
use ferrodesk_providers::UnconfiguredProvider;
use ferrodesk_tools::{ToolDeps, default_registry};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The persona described by the identity section.
pub fn identity_from_config(config: &IdentityConfig) -> Identity {
    let identity = Identity {
        agent_name: config.agent_name.clone(),
        product: config.product.clone(),
        support_contact: config.support_contact.clone(),
        prompt_override: None,
    };
    match &config.prompt_file {
        Some(path) => identity.with_prompt_file(path),
        None => identity,
    }
}

/// Overall budget for one knowledge retrieval.
///
/// Kept under the tool timeout so a hanging source ends in the degraded
/// "unavailable" search result instead of the tool being cancelled.
pub fn knowledge_deadline(config: &AppConfig) -> Duration {
    let tool_timeout = Duration::from_secs(config.orchestrator.tool_timeout_secs);
    tool_timeout - tool_timeout / 10
}

/// Build the orchestrator and all of its dependencies.
///
/// Does not fail: a missing API key, an unreachable knowledge source or a
/// memory store that cannot be opened each degrade to their unavailable
/// form and are reported when used.
pub async fn build_orchestrator(config: &AppConfig) -> Orchestrator {
    let events = Arc::new(EventBus::default());

    let router = ferrodesk_providers::build_from_config(config);
    let provider: Arc<dyn Provider> = router.default().unwrap_or_else(|| {
        Arc::new(UnconfiguredProvider::new(
            &config.provider.name,
            format!("provider '{}' is not registered", config.provider.name),
        ))
    });

    let retriever = Arc::new(
        ferrodesk_knowledge::build_from_config(&config.knowledge).with_deadline(knowledge_deadline(config)),
    );
    let memory = Arc::new(ferrodesk_memory::build_from_config(&config.memory).await);

    let identity = identity_from_config(&config.identity);
    let tools = default_registry(
        ToolDeps {
            retriever: retriever.clone(),
            memory: memory.clone(),
            events: events.clone(),
            support_contact: identity.support_contact.clone(),
        },
        &config.knowledge,
    );

    info!(
        provider = provider.name(),
        model = %config.provider.model,
        knowledge = retriever.source_name(),
        memory = memory.backend_name(),
        tools = tools.len(),
        "Orchestrator ready"
    );

    let orchestrator = Orchestrator::new(provider, Arc::new(tools), memory, events)
        .with_sessions(Arc::new(SessionStore::new(
            config.session.history_cap,
            config.session.max_sessions,
        )))
        .with_identity(identity)
        .with_assembler(ContextAssembler::new(ContextLimits::from(&config.context)))
        .with_model(&config.provider.model, config.provider.temperature)
        .with_max_tool_iterations(config.orchestrator.max_tool_iterations)
        .with_timeouts(
            Duration::from_secs(config.orchestrator.completion_timeout_secs),
            Duration::from_secs(config.orchestrator.tool_timeout_secs),
        )
        .with_service_name(&config.service_name);

    if config.provider.max_tokens > 0 {
        orchestrator.with_max_tokens(config.provider.max_tokens)
    } else {
        orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use async_trait::async_trait;
    use ferrodesk_core::envelope::InboundRequest;
    use ferrodesk_core::error::{ErrorKind, RetrievalError};
    use ferrodesk_core::knowledge::{KnowledgeSource, RetrievalResult};
    use ferrodesk_core::message::Role;
    use ferrodesk_core::tool::ToolRegistry;
    use ferrodesk_memory::MemoryStore;
    use ferrodesk_tools::SearchKnowledgeTool;
    use serde_json::json;

    /// A knowledge source that never answers.
    struct HangingSource;

    #[async_trait]
    impl KnowledgeSource for HangingSource {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn query(&self, _query: &str, _max: usize) -> Result<Vec<RetrievalResult>, RetrievalError> {
            std::future::pending().await
        }
    }

    fn offline_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.provider.name = "openai".into();
        config.provider.api_key = None;
        config.memory.backend = "none".into();
        config.knowledge.backend = "none".into();
        config
    }

    #[tokio::test]
    async fn builds_with_every_collaborator_unavailable() {
        let orch = build_orchestrator(&offline_config()).await;

        assert!(!orch.memory().is_available());
        assert_eq!(
            orch.tools().names(),
            vec!["escalate_to_human", "get_current_time", "recall_memories", "search_knowledge"]
        );
        assert_eq!(orch.sessions().history_cap(), 10);
    }

    #[tokio::test]
    async fn missing_api_key_surfaces_as_completion_failure() {
        let orch = build_orchestrator(&offline_config()).await;
        let env = orch.handle(InboundRequest::new("hola", "1")).await;

        assert_eq!(env.error_kind(), Some(ErrorKind::CompletionFailure));
        assert!(env.error.unwrap().message.contains("support@example.com"));
    }

    #[test]
    fn identity_uses_configured_contact() {
        let config = IdentityConfig {
            support_contact: "ayuda@example.mx".into(),
            ..IdentityConfig::default()
        };
        let identity = identity_from_config(&config);
        assert_eq!(identity.support_contact, "ayuda@example.mx");
        assert!(identity.prompt_override.is_none());
    }

    #[test]
    fn prompt_file_replaces_persona() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "Eres Sofía, asistente de pagos.").unwrap();

        let config = IdentityConfig {
            prompt_file: Some(path),
            ..IdentityConfig::default()
        };
        let prompt = identity_from_config(&config).system_prompt(&[]);
        assert!(prompt.starts_with("Eres Sofía"));
        assert!(prompt.contains("need_to_escalate"));
    }

    #[test]
    fn knowledge_deadline_fits_inside_the_tool_timeout() {
        let config = AppConfig::default();
        let tool_timeout = Duration::from_secs(config.orchestrator.tool_timeout_secs);
        assert!(knowledge_deadline(&config) < tool_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_knowledge_source_degrades_with_default_timeouts() {
        let config = AppConfig::default();
        let retriever = ferrodesk_knowledge::retriever_for(Arc::new(HangingSource), &config.knowledge)
            .with_deadline(knowledge_deadline(&config));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(SearchKnowledgeTool::new(
            Arc::new(retriever),
            config.knowledge.max_results,
            config.knowledge.min_score,
        )));

        let provider = Arc::new(SequentialMockProvider::tool_then_reply(
            vec![make_tool_call("search_knowledge", json!({"query": "pago OXXO"}))],
            make_reply("No puedo consultar la información ahora mismo.", &[], true),
        ));
        let orch = Orchestrator::new(
            provider.clone(),
            Arc::new(tools),
            Arc::new(MemoryStore::unavailable()),
            Arc::new(EventBus::default()),
        )
        .with_timeouts(
            Duration::from_secs(config.orchestrator.completion_timeout_secs),
            Duration::from_secs(config.orchestrator.tool_timeout_secs),
        );

        let env = orch.handle(InboundRequest::new("¿Cómo pago con OXXO?", "123")).await;

        assert!(env.success, "{env:?}");
        let details = &env.data.as_ref().unwrap().execution_details;
        assert_eq!(details.tools_used, vec!["search_knowledge"]);
        assert!(details.agents_involved.contains(&"knowledge_assistant".to_string()));

        let second = &provider.requests()[1];
        let tool_msg = second.messages.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(tool_msg.content.contains("cannot access the knowledge base"), "{}", tool_msg.content);
    }
}
