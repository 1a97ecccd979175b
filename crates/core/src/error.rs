//! Error types for the ferrodesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! wraps them and maps every failure onto one of the externally visible
//! [`ErrorKind`]s.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all ferrodesk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input validation ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Knowledge retrieval ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Completion (provider call or malformed structured output) ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Completion failed: {0}")]
    Completion(String),

    // --- Persisting a finished turn ---
    #[error("Persistence failed: {0}")]
    Persistence(String),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Externally visible failure categories.
///
/// Serialized into the `error_type` field of a failure envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "validation_error")]
    Validation,
    #[serde(rename = "retrieval_error")]
    Retrieval,
    #[serde(rename = "memory_unavailable")]
    MemoryUnavailable,
    #[serde(rename = "completion_failure")]
    CompletionFailure,
    #[serde(rename = "persistence_failure")]
    PersistenceFailure,
    #[serde(rename = "internal_error")]
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Retrieval => "retrieval_error",
            ErrorKind::MemoryUnavailable => "memory_unavailable",
            ErrorKind::CompletionFailure => "completion_failure",
            ErrorKind::PersistenceFailure => "persistence_failure",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// The externally visible category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Retrieval(_) => ErrorKind::Retrieval,
            Error::Memory(_) => ErrorKind::MemoryUnavailable,
            Error::Provider(_) | Error::Completion(_) | Error::Tool(_) => {
                ErrorKind::CompletionFailure
            }
            Error::Persistence(_) => ErrorKind::PersistenceFailure,
            Error::Config { .. } | Error::Serialization(_) | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// A message that is safe to show an end user.
    ///
    /// Validation messages describe the caller's mistake and pass through.
    /// Everything else collapses to a generic sentence so that provider
    /// bodies, file paths and SQL never reach the response.
    pub fn public_message(&self) -> String {
        match self {
            Error::Validation(e) => e.to_string(),
            _ => "We could not process your request right now.".to_string(),
        }
    }
}

// --- Bounded context errors ---

/// Bad or missing input fields. Surfaced immediately, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required and cannot be empty")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

impl ValidationError {
    pub fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Invalid retrieval parameters: {0}")]
    InvalidParameters(String),

    #[error("Knowledge source not configured: {0}")]
    NotConfigured(String),

    #[error("Knowledge source request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Knowledge source authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Knowledge source timed out: {0}")]
    Timeout(String),

    #[error("Knowledge source unreachable: {0}")]
    Network(String),

    #[error("Unexpected knowledge source response: {0}")]
    InvalidResponse(String),
}

impl RetrievalError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RetrievalError::Network(_) | RetrievalError::Timeout(_) => true,
            RetrievalError::ApiError { status_code, .. } => {
                matches!(status_code, 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Memory store unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Namespace template '{template}' has unresolved placeholder '{placeholder}'")]
    UnresolvedNamespace { template: String, placeholder: String },

    #[error("Memory operation timed out after {0}s")]
    Timeout(u64),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
