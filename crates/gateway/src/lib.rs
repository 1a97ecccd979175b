//! HTTP entrypoint for ferrodesk.
//!
//! Routes:
//! - `POST /invocations`: run one customer turn, respond with the envelope
//! - `GET /ping`: plain-text liveness probe
//! - `GET /health`: JSON status of the service and its collaborators
//!
//! Built on Axum.

pub mod events;
pub mod invocations;

use axum::http::{HeaderName, Method, header};
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use ferrodesk_agent::{Orchestrator, build_orchestrator};
use ferrodesk_config::{AppConfig, GatewayConfig};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use events::spawn_event_logger;
pub use invocations::SESSION_HEADER;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    pub started_at: DateTime<Utc>,
}

impl GatewayState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let router = Router::new()
        .route("/invocations", post(invocations::invoke_handler))
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes));

    let router = if config.cors {
        router.layer(cors_layer())
    } else {
        router
    };
    router.layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SESSION_HEADER)])
        .expose_headers([HeaderName::from_static(SESSION_HEADER)])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server and run until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let orchestrator = Arc::new(build_orchestrator(&config).await);
    let _event_logger = spawn_event_logger(orchestrator.events());
    let app = build_router(Arc::new(GatewayState::new(orchestrator)), &config.gateway);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| GatewayError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Could not listen for Ctrl-C, running until killed: {e}");
            std::future::pending::<()>().await;
        }
    }
}

// --- Handlers ---

async fn ping_handler() -> &'static str {
    "Healthy"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    service: String,
    provider: String,
    memory_backend: String,
    memory_available: bool,
    tools: Vec<String>,
    uptime_seconds: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let orch = &state.orchestrator;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        service: orch.service_name().to_string(),
        provider: orch.provider_name().to_string(),
        memory_backend: orch.memory().backend_name().to_string(),
        memory_available: orch.memory().is_available(),
        tools: orch.tools().names().into_iter().map(String::from).collect(),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ferrodesk_core::error::ProviderError;
    use ferrodesk_core::event::{DomainEvent, EventBus};
    use ferrodesk_core::message::Message;
    use ferrodesk_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use ferrodesk_core::tool::ToolRegistry;
    use ferrodesk_memory::MemoryStore;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    /// Replies with the same text to every request, or fails every request.
    struct FixedProvider {
        reply: Option<String>,
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            match &self.reply {
                Some(text) => Ok(ProviderResponse {
                    message: Message::assistant(text),
                    usage: None,
                    model: "fixed-model".into(),
                }),
                None => Err(ProviderError::Network("connection reset".into())),
            }
        }
    }

    fn app_with(reply: Option<&str>) -> Router {
        let orchestrator = Orchestrator::new(
            Arc::new(FixedProvider {
                reply: reply.map(String::from),
            }),
            Arc::new(ToolRegistry::new()),
            Arc::new(MemoryStore::unavailable()),
            Arc::new(EventBus::default()),
        );
        build_router(Arc::new(GatewayState::new(Arc::new(orchestrator))), &GatewayConfig::default())
    }

    fn app() -> Router {
        app_with(Some(r#"{"response": "Puedes pagar en OXXO.", "tools_used": [], "need_to_escalate": "false"}"#))
    }

    fn invocation(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/invocations")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ping_endpoint() {
        let req = Request::builder().uri("/ping").body(Body::empty()).unwrap();
        let response = app().oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"Healthy");
    }

    #[tokio::test]
    async fn health_endpoint() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app().oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "fixed");
        assert_eq!(body["memory_available"], false);
    }

    #[tokio::test]
    async fn successful_invocation() {
        let response = app()
            .oneshot(invocation(r#"{"prompt": "¿Cómo pago con OXXO?", "user_id": "123"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let session = response.headers()[SESSION_HEADER].to_str().unwrap().to_string();
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["response"], "Puedes pagar en OXXO.");
        assert_eq!(body["data"]["session_info"]["user_id"], "123");
        assert_eq!(body["data"]["session_info"]["session_id"], Value::String(session));
    }

    #[tokio::test]
    async fn session_header_wins_over_body() {
        let mut req = invocation(r#"{"prompt": "hola", "user_id": "1", "session_id": "from-body"}"#);
        req.headers_mut().insert(SESSION_HEADER, "from-header".parse().unwrap());
        let body = json_body(app().oneshot(req).await.unwrap()).await;
        assert_eq!(body["data"]["session_info"]["session_id"], "from-header");

        let body = json_body(
            app()
                .oneshot(invocation(r#"{"prompt": "hola", "user_id": "1", "session_id": "from-body"}"#))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["data"]["session_info"]["session_id"], "from-body");
    }

    #[tokio::test]
    async fn empty_prompt_is_bad_request() {
        let response = app()
            .oneshot(invocation(r#"{"prompt": "", "user_id": "123"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["error_type"], "validation_error");
        assert!(body["error"]["message"].as_str().unwrap().contains("prompt"));
        assert!(body["error"]["session_id"].as_str().unwrap().starts_with("session-"));
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let response = app().oneshot(invocation("{prompt: nope")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["error_type"], "validation_error");
        assert!(body["error"].get("user_id").is_none());
    }

    #[tokio::test]
    async fn provider_failure_is_server_error() {
        let response = app_with(None)
            .oneshot(invocation(r#"{"prompt": "hola", "user_id": "1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"]["error_type"], "completion_failure");
        assert_eq!(body["error"]["user_id"], "1");
        assert!(!body["error"]["message"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let config = GatewayConfig {
            max_body_bytes: 64,
            ..GatewayConfig::default()
        };
        let orchestrator = Orchestrator::new(
            Arc::new(FixedProvider { reply: None }),
            Arc::new(ToolRegistry::new()),
            Arc::new(MemoryStore::unavailable()),
            Arc::new(EventBus::default()),
        );
        let app = build_router(Arc::new(GatewayState::new(Arc::new(orchestrator))), &config);

        let prompt = "a".repeat(500);
        let response = app
            .oneshot(invocation(&json!({"prompt": prompt, "user_id": "1"}).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn event_logger_stops_when_bus_is_dropped() {
        let bus = EventBus::default();
        let handle = spawn_event_logger(&bus);
        bus.publish(DomainEvent::TurnFailed {
            session_id: "s".into(),
            error_type: "internal_error".into(),
            timestamp: Utc::now(),
        });
        drop(bus);
        handle.await.unwrap();
    }
}
