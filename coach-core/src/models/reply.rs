use serde::{Deserialize, Serialize};

/// Highest value of `score_pronunciation`.
pub const MAX_SCORE: f64 = 10.0;

/// Structured coaching reply produced by the model for one candidate answer.
///
/// Every field defaults when absent so a partially-filled model reply still
/// parses; only a reply that is not a JSON object at all falls back to
/// [`CoachReply::fallback`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CoachReply {
    pub coach_response_text: String,
    pub transcription_user: String,
    pub score_pronunciation: f64,
    pub feedback_intonation: String,
    pub feedback_grammar: String,
    pub better_response_example: String,
    pub next_step_advice: String,
}

impl CoachReply {
    /// Neutral reply used when the model output cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            coach_response_text:
                "I'm sorry, I didn't quite catch that. Could you give me your answer again?"
                    .to_string(),
            transcription_user: String::new(),
            score_pronunciation: 0.0,
            feedback_intonation: String::new(),
            feedback_grammar: String::new(),
            better_response_example: String::new(),
            next_step_advice: "Try again.".to_string(),
        }
    }

    /// Clamp the score into `0..=MAX_SCORE`; NaN becomes 0.
    pub fn normalized(mut self) -> Self {
        self.score_pronunciation = if self.score_pronunciation.is_nan() {
            0.0
        } else {
            self.score_pronunciation.clamp(0.0, MAX_SCORE)
        };
        self
    }

    /// JSON schema sent as `responseSchema` in the generation config.
    pub fn response_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "coach_response_text": { "type": "STRING" },
                "transcription_user": { "type": "STRING" },
                "score_pronunciation": { "type": "NUMBER" },
                "feedback_intonation": { "type": "STRING" },
                "feedback_grammar": { "type": "STRING" },
                "better_response_example": { "type": "STRING" },
                "next_step_advice": { "type": "STRING" }
            },
            "required": [
                "coach_response_text",
                "transcription_user",
                "score_pronunciation",
                "better_response_example"
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_reply_defaults_missing_fields() {
        let reply: CoachReply =
            serde_json::from_str(r#"{"coach_response_text":"Go on.","score_pronunciation":7}"#)
                .unwrap();
        assert_eq!(reply.coach_response_text, "Go on.");
        assert_eq!(reply.score_pronunciation, 7.0);
        assert!(reply.feedback_grammar.is_empty());
    }

    #[test]
    fn test_normalized_clamps_score() {
        let high = CoachReply {
            score_pronunciation: 42.0,
            ..Default::default()
        };
        assert_eq!(high.normalized().score_pronunciation, MAX_SCORE);

        let low = CoachReply {
            score_pronunciation: -3.0,
            ..Default::default()
        };
        assert_eq!(low.normalized().score_pronunciation, 0.0);
    }

    #[test]
    fn test_fallback_is_neutral() {
        let fb = CoachReply::fallback();
        assert_eq!(fb.score_pronunciation, 0.0);
        assert!(fb.feedback_grammar.is_empty());
        assert!(!fb.coach_response_text.is_empty());
    }
}
