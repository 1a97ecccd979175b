//! Inbound requests and outbound response envelopes.
//!
//! Every answer the service gives, success or failure, is one
//! [`ResponseEnvelope`]. Failures always carry a session id and a
//! timestamp so they can be traced without reproducing them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{ErrorKind, ValidationError};

/// A customer message as received from the entrypoint layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundRequest {
    #[serde(default)]
    pub prompt: String,

    #[serde(default)]
    pub user_id: String,

    /// Caller-supplied session id; a fallback is generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl InboundRequest {
    pub fn new(prompt: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            user_id: user_id.into(),
            session_id: None,
            metadata: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Both `prompt` and `user_id` must be present and non-blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::missing("prompt"));
        }
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::missing("user_id"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionDetails {
    pub tools_used: Vec<String>,
    pub agents_involved: Vec<String>,
    pub processing_time_seconds: f64,
    /// Whether any long-term memory made it into the context
    pub memory_context: bool,
    pub conversation_history_available: bool,
    pub need_to_escalate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessData {
    pub response: String,
    pub session_info: SessionInfo,
    pub execution_details: ExecutionDetails,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Sanitized, human-readable message
    pub message: String,
    pub error_type: ErrorKind,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub processing_time_seconds: f64,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SuccessData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResponseEnvelope {
    pub fn success(data: SuccessData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: ErrorBody) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn response_text(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.response.as_str())
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.error_type)
    }

    pub fn session_id(&self) -> &str {
        match (&self.data, &self.error) {
            (Some(d), _) => &d.session_info.session_id,
            (None, Some(e)) => &e.session_id,
            (None, None) => "",
        }
    }
}
