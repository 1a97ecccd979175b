//! The ferrodesk turn engine.
//!
//! A customer turn moves through four steps:
//!
//! 1. **Receive** a validated request and resolve its session id
//! 2. **Build context** from long-term memory, recent session turns and the
//!    message itself, within fixed caps
//! 3. **Complete** with the model, running any tools it calls, until it
//!    replies with the structured output object
//! 4. **Persist** the turn to session history and the memory event log
//!
//! [`Orchestrator::handle`] runs all four and always returns an envelope.

pub mod bootstrap;
pub mod context;
pub mod orchestrator;
pub mod output;
pub mod session_id;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bootstrap::{build_orchestrator, identity_from_config};
pub use context::{AssembledContext, ContextAssembler, ContextLimits, ContextStats, clean_snippet};
pub use orchestrator::{Orchestrator, TurnState};
pub use output::{AgentOutput, parse_agent_output};
pub use session_id::{fallback_session_id, generate_session_id, resolve_session_id};
