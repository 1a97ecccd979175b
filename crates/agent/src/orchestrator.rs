//! The turn orchestrator.
//!
//! One call to [`Orchestrator::handle`] takes a customer message through the
//! full turn lifecycle:
//!
//! ```text
//! Received ──► ContextBuilt ──► Completed ──► Persisted
//!     │              │              │
//!     └──────────────┴──────────────┴──► Failed
//! ```
//!
//! Memory and knowledge failures degrade inside their adapters and never
//! reach this level. Completion failures end the turn in `Failed` with a
//! sanitized envelope. Persistence failures are logged and the reply is
//! returned unchanged.

use crate::context::{AssembledContext, ContextAssembler};
use crate::output::{AgentOutput, parse_agent_output};
use crate::session_id::resolve_session_id;
use chrono::Utc;
use ferrodesk_core::envelope::{
    ErrorBody, ExecutionDetails, InboundRequest, ResponseEnvelope, SessionInfo, SuccessData,
};
use ferrodesk_core::error::{Error, ErrorKind, ProviderError, ToolError};
use ferrodesk_core::event::{DomainEvent, EventBus};
use ferrodesk_core::identity::Identity;
use ferrodesk_core::message::{Message, MessageToolCall};
use ferrodesk_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use ferrodesk_core::tool::{ToolCall, ToolContext, ToolRegistry};
use ferrodesk_core::turn::Turn;
use ferrodesk_memory::{MemoryStore, SessionStore};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Lifecycle of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Received,
    ContextBuilt,
    Completed,
    Persisted,
    Failed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TurnState::Received => "received",
            TurnState::ContextBuilt => "context_built",
            TurnState::Completed => "completed",
            TurnState::Persisted => "persisted",
            TurnState::Failed => "failed",
        })
    }
}

const KNOWLEDGE_TOOL: &str = "search_knowledge";

/// Drives customer turns: context, completion with tools, persistence.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    memory: Arc<MemoryStore>,
    sessions: Arc<SessionStore>,
    events: Arc<EventBus>,
    identity: Identity,
    assembler: ContextAssembler,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_tool_iterations: usize,
    completion_timeout: Duration,
    tool_timeout: Duration,
    service_name: String,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        memory: Arc<MemoryStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            tools,
            memory,
            sessions: Arc::new(SessionStore::default()),
            events,
            identity: Identity::default(),
            assembler: ContextAssembler::default(),
            model: "gpt-4o-mini".into(),
            temperature: 0.3,
            max_tokens: None,
            max_tool_iterations: 5,
            completion_timeout: Duration::from_secs(180),
            tool_timeout: Duration::from_secs(150),
            service_name: "ferrodesk".into(),
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, temperature: f32) -> Self {
        self.model = model.into();
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Provider rounds that may offer tools before the final, tool-less round.
    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max;
        self
    }

    pub fn with_timeouts(mut self, completion: Duration, tool: Duration) -> Self {
        self.completion_timeout = completion;
        self.tool_timeout = tool;
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Handle one customer message. Never fails: errors become a failure
    /// envelope that still carries the session id.
    pub async fn handle(&self, request: InboundRequest) -> ResponseEnvelope {
        let started = Instant::now();
        let session_id = resolve_session_id([request.session_id.as_deref()]);

        if let Err(e) = request.validate() {
            info!(session_id = %session_id, "Rejected invalid request: {e}");
            return self.failure_envelope(Error::from(e), &session_id, &request.user_id, started);
        }

        match self.run_turn(&request, &session_id, started).await {
            Ok(data) => ResponseEnvelope::success(data),
            Err(e) => {
                error!(
                    session_id = %session_id,
                    error_type = %e.kind(),
                    state = %TurnState::Failed,
                    "Turn failed: {e}"
                );
                self.failure_envelope(e, &session_id, &request.user_id, started)
            }
        }
    }

    async fn run_turn(
        &self,
        request: &InboundRequest,
        session_id: &str,
        started: Instant,
    ) -> Result<SuccessData, Error> {
        let user_id = request.user_id.trim();
        let actor_id = self.memory.actor_id(user_id);

        // ── Received ──
        info!(session_id, actor_id = %actor_id, state = %TurnState::Received, "Processing turn");
        self.events.publish(DomainEvent::TurnReceived {
            session_id: session_id.to_string(),
            actor_id: actor_id.clone(),
            timestamp: Utc::now(),
        });

        // Held until the turn is persisted so turns of one session never interleave.
        let mut history = self.sessions.lock(session_id).await;

        // ── ContextBuilt ──
        let long_term = self.memory.retrieve_all(&actor_id, Some(session_id)).await;
        let recent = history.recent(self.assembler.limits().history_turns);
        let context = self
            .assembler
            .build_context(&request.prompt, user_id, &recent, &long_term);
        self.publish_context_built(session_id, &context);

        // ── Completed ──
        let tool_ctx = ToolContext {
            actor_id: actor_id.clone(),
            session_id: session_id.to_string(),
        };
        let (raw, executed) = self.complete_with_tools(&context.text, &tool_ctx).await?;
        let output = parse_agent_output(&raw)?;
        let tools_used = merge_tools(&output.tools_used, &executed);

        info!(
            session_id,
            state = %TurnState::Completed,
            tools = ?tools_used,
            need_to_escalate = output.need_to_escalate,
            "Turn completed"
        );
        self.events.publish(DomainEvent::TurnCompleted {
            session_id: session_id.to_string(),
            tools_used: tools_used.clone(),
            need_to_escalate: output.need_to_escalate,
            timestamp: Utc::now(),
        });

        // ── Persisted ──
        let turn = Turn::new(&actor_id, session_id, request.prompt.trim(), &output.response)
            .with_metadata("need_to_escalate", json!(output.need_to_escalate))
            .with_metadata("tools_used", json!(tools_used));
        history.push(turn.clone());
        self.persist(&turn).await;
        drop(history);

        Ok(self.success_data(request, session_id, output, tools_used, &context, !recent.is_empty(), started))
    }

    fn publish_context_built(&self, session_id: &str, context: &AssembledContext) {
        let stats = &context.stats;
        debug!(
            session_id,
            state = %TurnState::ContextBuilt,
            history_turns = stats.history_turns,
            memory_snippets = stats.memory_snippets(),
            dropped = stats.dropped,
            estimated_tokens = stats.estimated_tokens,
            "Context assembled"
        );
        self.events.publish(DomainEvent::ContextBuilt {
            session_id: session_id.to_string(),
            history_turns: stats.history_turns,
            memory_snippets: stats.memory_snippets(),
            context_chars: stats.chars,
            timestamp: Utc::now(),
        });
    }

    /// Append the turn to the event log. Best-effort.
    async fn persist(&self, turn: &Turn) {
        let logged = self.memory.append_turn(turn).await;
        if !logged && self.memory.is_available() {
            let e = Error::Persistence(format!(
                "turn for session {} was not written to the event log",
                turn.session_id
            ));
            warn!(session_id = %turn.session_id, error_type = %e.kind(), "{e}");
        }
        self.events.publish(DomainEvent::TurnPersisted {
            session_id: turn.session_id.clone(),
            event_logged: logged,
            timestamp: Utc::now(),
        });
        debug!(session_id = %turn.session_id, state = %TurnState::Persisted, event_logged = logged, "Turn persisted");
    }

    // ── Completion ────────────────────────────────────────────────────────

    /// Run provider rounds until the model answers without tool calls.
    ///
    /// Returns the final text and the names of the tools that ran.
    async fn complete_with_tools(
        &self,
        user_context: &str,
        ctx: &ToolContext,
    ) -> Result<(String, Vec<String>), Error> {
        let mut messages = vec![
            Message::system(self.identity.system_prompt(&self.tools.names())),
            Message::user(user_context),
        ];
        let definitions = self.tools.definitions();
        let mut executed = Vec::new();

        for round in 0..=self.max_tool_iterations {
            let last_round = round == self.max_tool_iterations;
            let tools = if last_round { Vec::new() } else { definitions.clone() };

            debug!(session_id = %ctx.session_id, round, "Completion round");
            let response = self.complete(messages.clone(), tools).await?;

            if response.message.tool_calls.is_empty() {
                return Ok((response.message.content, executed));
            }
            if last_round {
                break;
            }

            let calls = response.message.tool_calls.clone();
            messages.push(response.message);
            for tc in &calls {
                let (output, ran) = self.run_tool(tc, ctx).await;
                if ran {
                    executed.push(tc.name.clone());
                }
                messages.push(Message::tool_result(&tc.id, output));
            }
        }

        warn!(
            session_id = %ctx.session_id,
            iterations = self.max_tool_iterations,
            "Model kept calling tools after the tool budget was spent"
        );
        Err(Error::Completion(format!(
            "no final reply after {} tool rounds",
            self.max_tool_iterations
        )))
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ProviderResponse, Error> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
        };

        let response = tokio::time::timeout(self.completion_timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "completion exceeded {}s",
                    self.completion_timeout.as_secs()
                ))
            })??;

        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion received"
            );
        }
        Ok(response)
    }

    /// Execute one tool call. Failures are reported back to the model as
    /// the tool's output; the bool says whether the tool actually ran.
    async fn run_tool(&self, tc: &MessageToolCall, ctx: &ToolContext) -> (String, bool) {
        let arguments = if tc.arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str::<Value>(&tc.arguments) {
                Ok(v) => v,
                Err(e) => {
                    warn!(tool = %tc.name, "Tool arguments are not valid JSON: {e}");
                    let err = ToolError::InvalidArguments(format!("arguments must be a JSON object: {e}"));
                    return (format!("Error: {err}"), false);
                }
            }
        };

        let call = ToolCall {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments,
        };

        let started = Instant::now();
        match tokio::time::timeout(self.tool_timeout, self.tools.execute(&call, ctx)).await {
            Ok(Ok(result)) => {
                debug!(
                    tool = %tc.name,
                    success = result.success,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Tool executed"
                );
                (result.output, true)
            }
            Ok(Err(e)) => {
                warn!(tool = %tc.name, error = %e, "Tool execution failed");
                (format!("Error: {e}"), false)
            }
            Err(_) => {
                let e = ToolError::Timeout {
                    tool_name: tc.name.clone(),
                    timeout_secs: self.tool_timeout.as_secs(),
                };
                warn!(tool = %tc.name, "{e}");
                (format!("Error: {e}"), false)
            }
        }
    }

    // ── Envelopes ─────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn success_data(
        &self,
        request: &InboundRequest,
        session_id: &str,
        output: AgentOutput,
        tools_used: Vec<String>,
        context: &AssembledContext,
        history_available: bool,
        started: Instant,
    ) -> SuccessData {
        let now = Utc::now();

        let mut agents_involved = vec!["orchestrator".to_string()];
        if tools_used.iter().any(|t| t == KNOWLEDGE_TOOL) {
            agents_involved.push("knowledge_assistant".into());
        }

        let mut metadata = request.metadata.clone().unwrap_or_default();
        metadata.insert("source".into(), json!("runtime"));
        metadata.insert("service".into(), json!(self.service_name));
        metadata.insert("timestamp".into(), json!(now.to_rfc3339()));
        metadata.insert("session_id".into(), json!(session_id));

        SuccessData {
            response: output.response,
            session_info: SessionInfo {
                session_id: session_id.to_string(),
                user_id: request.user_id.trim().to_string(),
                timestamp: now,
            },
            execution_details: ExecutionDetails {
                tools_used,
                agents_involved,
                processing_time_seconds: started.elapsed().as_secs_f64(),
                memory_context: context.stats.memory_snippets() > 0,
                conversation_history_available: history_available,
                need_to_escalate: output.need_to_escalate,
            },
            metadata,
        }
    }

    /// The failure envelope for `e`. Entry points use this for requests
    /// rejected before they reach [`Orchestrator::handle`].
    pub fn failure_envelope(
        &self,
        e: Error,
        session_id: &str,
        user_id: &str,
        started: Instant,
    ) -> ResponseEnvelope {
        let kind = e.kind();
        self.events.publish(DomainEvent::TurnFailed {
            session_id: session_id.to_string(),
            error_type: kind.to_string(),
            timestamp: Utc::now(),
        });

        let (message, source) = match kind {
            ErrorKind::Validation => (e.public_message(), "validation"),
            _ => (
                format!(
                    "{} If the problem persists, contact {}.",
                    e.public_message(),
                    self.identity.support_contact
                ),
                "orchestrator",
            ),
        };

        let user_id = user_id.trim();
        ResponseEnvelope::failure(ErrorBody {
            message,
            error_type: kind,
            session_id: session_id.to_string(),
            user_id: (!user_id.is_empty()).then(|| user_id.to_string()),
            timestamp: Utc::now(),
            processing_time_seconds: started.elapsed().as_secs_f64(),
            source: source.to_string(),
        })
    }
}

/// Model-reported tools followed by any executed ones it left out, without
/// duplicates.
fn merge_tools(reported: &[String], executed: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for name in reported.iter().chain(executed) {
        if !merged.contains(name) {
            merged.push(name.clone());
        }
    }
    merged
}
