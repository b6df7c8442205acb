//! Pull a JSON object out of model text that may be wrapped in markdown.
//!
//! The model is asked for bare JSON but regularly answers with a fenced
//! block (```json ... ```) or a sentence before the object. `extract_json`
//! removes that wrapping; `parse_reply` falls back to
//! [`CoachReply::fallback`] when what remains still does not parse.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::CoachReply;

static FENCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*$")
        .expect("fence pattern is valid")
});

/// Result of parsing model output into a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub reply: CoachReply,
    /// `true` when the fallback payload was substituted.
    pub recovered: bool,
}

/// Return the JSON payload inside `text`, without fences or surrounding prose.
///
/// Text that carries no recognisable wrapper is returned trimmed.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if trimmed.starts_with("```") {
        if let Some(inner) = FENCED.captures(trimmed).and_then(|c| c.get(1)) {
            return inner.as_str().trim();
        }
        // Unterminated fence: drop the opening line only.
        return match trimmed.find('\n') {
            Some(idx) => trimmed[idx + 1..].trim(),
            None => trimmed.trim_start_matches('`').trim(),
        };
    }

    if !trimmed.starts_with('{') {
        if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if start < end {
                return &trimmed[start..=end];
            }
        }
    }

    trimmed
}

/// Parse model output into a reply, substituting the fallback on failure.
pub fn parse_reply(text: &str) -> ParsedReply {
    let payload = extract_json(text);
    match serde_json::from_str::<CoachReply>(payload) {
        Ok(reply) if reply.coach_response_text.trim().is_empty() => {
            tracing::warn!("Model reply has no coach_response_text, using fallback payload");
            ParsedReply {
                reply: CoachReply::fallback(),
                recovered: true,
            }
        }
        Ok(reply) => ParsedReply {
            reply: reply.normalized(),
            recovered: false,
        },
        Err(e) => {
            tracing::warn!(
                error = %e,
                preview = %payload.chars().take(120).collect::<String>(),
                "Model output is not valid reply JSON, using fallback payload"
            );
            ParsedReply {
                reply: CoachReply::fallback(),
                recovered: true,
            }
        }
    }
}
