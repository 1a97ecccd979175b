//! Context assembly for a single turn.

pub mod assembler;
pub mod token;

pub use assembler::{AssembledContext, ContextAssembler, ContextLimits, ContextStats, clean_snippet};
