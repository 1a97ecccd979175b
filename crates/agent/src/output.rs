//! Parsing the model's structured reply.
//!
//! Every final reply must be one JSON object:
//! `{"response": "...", "tools_used": [...], "need_to_escalate": "true" | "false"}`.
//! Models sometimes wrap it in a markdown fence or a line of prose; both are
//! tolerated. The escalation flag is read from the object only, never from
//! the response text.

use ferrodesk_core::error::Error;
use serde::{Deserialize, Deserializer};

/// The parsed structured reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentOutput {
    pub response: String,

    #[serde(default)]
    pub tools_used: Vec<String>,

    #[serde(default, deserialize_with = "flag")]
    pub need_to_escalate: bool,
}

/// Accepts `true`/`false` as JSON booleans or as strings, any case.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "need_to_escalate must be \"true\" or \"false\", got \"{other}\""
            ))),
        },
    }
}

/// The JSON object inside `raw`: the whole text, a fenced block, or the
/// outermost `{...}` span.
fn json_candidate(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// Parse a final reply. Anything that is not a valid contract object is a
/// completion failure.
pub fn parse_agent_output(raw: &str) -> Result<AgentOutput, Error> {
    let candidate = json_candidate(raw)
        .ok_or_else(|| Error::Completion("model reply contains no JSON object".into()))?;

    let mut output: AgentOutput = serde_json::from_str(candidate)
        .map_err(|e| Error::Completion(format!("model reply does not match the output contract: {e}")))?;

    output.response = output.response.trim().to_string();
    if output.response.is_empty() {
        return Err(Error::Completion("model reply has an empty response".into()));
    }
    output.tools_used.retain(|t| !t.trim().is_empty());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_flags() {
        let out = parse_agent_output(
            r#"{"response": "Claro", "tools_used": ["search_knowledge"], "need_to_escalate": "false"}"#,
        )
        .unwrap();
        assert_eq!(out.response, "Claro");
        assert_eq!(out.tools_used, vec!["search_knowledge"]);
        assert!(!out.need_to_escalate);
    }

    #[test]
    fn escalation_flag_wins_over_response_text() {
        let out = parse_agent_output(
            r#"{"response": "No need for a human, all good.", "tools_used": [], "need_to_escalate": "true"}"#,
        )
        .unwrap();
        assert!(out.need_to_escalate);

        let calm = parse_agent_output(
            r#"{"response": "I will escalate to a human agent now.", "need_to_escalate": "false"}"#,
        )
        .unwrap();
        assert!(!calm.need_to_escalate);
    }

    #[test]
    fn accepts_bool_and_mixed_case() {
        assert!(parse_agent_output(r#"{"response": "x", "need_to_escalate": true}"#).unwrap().need_to_escalate);
        assert!(parse_agent_output(r#"{"response": "x", "need_to_escalate": "TRUE"}"#).unwrap().need_to_escalate);
    }

    #[test]
    fn tolerates_code_fences_and_prose() {
        let fenced = "```json\n{\"response\": \"Hola\", \"need_to_escalate\": \"false\"}\n```";
        assert_eq!(parse_agent_output(fenced).unwrap().response, "Hola");

        let chatty = "Here you go: {\"response\": \"Hola\", \"tools_used\": []} hope it helps";
        assert_eq!(parse_agent_output(chatty).unwrap().response, "Hola");
    }

    #[test]
    fn missing_optional_fields_default() {
        let out = parse_agent_output(r#"{"response": "ok"}"#).unwrap();
        assert!(out.tools_used.is_empty());
        assert!(!out.need_to_escalate);
    }

    #[test]
    fn plain_text_is_a_completion_failure() {
        let err = parse_agent_output("Sure, you can pay at OXXO.").unwrap_err();
        assert_eq!(err.kind(), ferrodesk_core::ErrorKind::CompletionFailure);
    }

    #[test]
    fn bad_flag_and_empty_response_are_rejected() {
        assert!(parse_agent_output(r#"{"response": "x", "need_to_escalate": "maybe"}"#).is_err());
        assert!(parse_agent_output(r#"{"response": "   "}"#).is_err());
        assert!(parse_agent_output(r#"{"tools_used": []}"#).is_err());
    }
}
