//! Fallback session ids.

use chrono::{DateTime, Utc};
use rand::Rng;

/// `session-{YYYYMMDDHHMMSS}-{8 hex}` for the given time and rng.
pub fn generate_session_id<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: u32 = rng.random();
    format!("session-{}-{:08x}", now.format("%Y%m%d%H%M%S"), suffix)
}

/// A fresh id from the wall clock and the thread rng.
pub fn fallback_session_id() -> String {
    generate_session_id(Utc::now(), &mut rand::rng())
}

/// The first non-blank candidate, or a fresh fallback id.
pub fn resolve_session_id<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(fallback_session_id)
}
