//! # ferrodesk core
//!
//! Domain types, traits, and error definitions for the ferrodesk
//! customer-service orchestrator. Every outward-facing collaborator
//! (completion provider, knowledge source, memory backend, tools) is defined
//! as a trait here; implementations live in their own crates and are
//! injected into the orchestrator as explicit dependency objects.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod memory;
pub mod knowledge;
pub mod turn;
pub mod envelope;
pub mod identity;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorKind, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolContext, ToolRegistry, ToolResult};
pub use memory::{LongTermMemory, MemoryBackend, MemoryEvent, MemoryRecord, NamespaceKind};
pub use knowledge::{KnowledgeSource, RetrievalOutcome, RetrievalResult};
pub use turn::{SessionHistory, Turn, DEFAULT_HISTORY_CAP};
pub use envelope::{InboundRequest, ResponseEnvelope};
pub use event::{DomainEvent, EventBus};
