//! `POST /invocations`: one customer turn per request.

use crate::SharedState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use ferrodesk_agent::resolve_session_id;
use ferrodesk_core::envelope::{InboundRequest, ResponseEnvelope};
use ferrodesk_core::error::{ErrorKind, ValidationError};
use std::time::Instant;
use tracing::{debug, warn};

/// Header carrying the caller's session id. Echoed on every response.
pub const SESSION_HEADER: &str = "x-session-id";

/// 200 for success, 400 for caller mistakes, 500 for everything else.
pub fn status_for(envelope: &ResponseEnvelope) -> StatusCode {
    match envelope.error_kind() {
        None => StatusCode::OK,
        Some(ErrorKind::Validation) => StatusCode::BAD_REQUEST,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(envelope: ResponseEnvelope) -> Response {
    let status = status_for(&envelope);
    let session = HeaderValue::from_str(envelope.session_id()).ok();
    let mut response = (status, Json(envelope)).into_response();
    if let Some(value) = session {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

pub async fn invoke_handler(State(state): State<SharedState>, headers: HeaderMap, body: Bytes) -> Response {
    let started = Instant::now();
    let header_session = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok());

    // The body is parsed here rather than by the Json extractor so a
    // malformed payload still gets an envelope.
    let mut request: InboundRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let session_id = resolve_session_id([header_session]);
            warn!(session_id = %session_id, bytes = body.len(), "Malformed invocation body: {e}");
            let error = ValidationError::MalformedBody("expected a JSON object with 'prompt' and 'user_id'".into());
            return respond(
                state
                    .orchestrator
                    .failure_envelope(error.into(), &session_id, "", started),
            );
        }
    };

    request.session_id = Some(resolve_session_id([header_session, request.session_id.as_deref()]));
    debug!(session_id = ?request.session_id, prompt_chars = request.prompt.chars().count(), "Invocation received");

    respond(state.orchestrator.handle(request).await)
}
