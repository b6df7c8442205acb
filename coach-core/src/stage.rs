//! Interview phase derived from how many turns a session has recorded.

use serde::{Deserialize, Serialize};

/// Interview phases in the order a session moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Introduction,
    ExperienceDeepDive,
    Challenge,
    Closing,
}

/// First turn count of each stage after `Introduction`.
const DEEP_DIVE_FROM: u64 = 3;
const CHALLENGE_FROM: u64 = 9;
const CLOSING_FROM: u64 = 15;

/// Map the number of recorded turns (both sides) to the current stage.
pub fn stage_for_turn_count(turns: u64) -> Stage {
    match turns {
        t if t >= CLOSING_FROM => Stage::Closing,
        t if t >= CHALLENGE_FROM => Stage::Challenge,
        t if t >= DEEP_DIVE_FROM => Stage::ExperienceDeepDive,
        _ => Stage::Introduction,
    }
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Introduction,
        Stage::ExperienceDeepDive,
        Stage::Challenge,
        Stage::Closing,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Introduction => "introduction",
            Stage::ExperienceDeepDive => "experience_deep_dive",
            Stage::Challenge => "challenge",
            Stage::Closing => "closing",
        }
    }

    /// Steering sentence appended to the system instruction.
    pub fn instruction(&self) -> &'static str {
        match self {
            Stage::Introduction => {
                "Warm-up: ask about background and motivation for the role."
            }
            Stage::ExperienceDeepDive => {
                "Dig into one concrete past project: ask for situation, actions and measurable results."
            }
            Stage::Challenge => {
                "Raise the difficulty: ask a technical or behavioural challenge question tied to the job."
            }
            Stage::Closing => {
                "Wrap up: ask if the candidate has questions and give a short overall assessment."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // TEST 1: thresholds
    // ========================================================================
    #[test]
    fn test_stage_thresholds() {
        assert_eq!(stage_for_turn_count(0), Stage::Introduction);
        assert_eq!(stage_for_turn_count(2), Stage::Introduction);
        assert_eq!(stage_for_turn_count(3), Stage::ExperienceDeepDive);
        assert_eq!(stage_for_turn_count(8), Stage::ExperienceDeepDive);
        assert_eq!(stage_for_turn_count(9), Stage::Challenge);
        assert_eq!(stage_for_turn_count(14), Stage::Challenge);
        assert_eq!(stage_for_turn_count(15), Stage::Closing);
    }

    // ========================================================================
    // TEST 2: total and monotonic over a wide range
    // ========================================================================
    #[test]
    fn test_stage_is_monotonic() {
        let mut previous = stage_for_turn_count(0);
        for n in 1..500u64 {
            let current = stage_for_turn_count(n);
            assert!(current >= previous, "stage regressed at {}", n);
            previous = current;
        }
        assert_eq!(stage_for_turn_count(u64::MAX), Stage::Closing);
    }

    // ========================================================================
    // TEST 3: every stage is reachable
    // ========================================================================
    #[test]
    fn test_every_stage_reachable() {
        for stage in Stage::ALL {
            assert!((0..=CLOSING_FROM).any(|n| stage_for_turn_count(n) == stage));
        }
    }

    #[test]
    fn test_labels_match_serde() {
        for stage in Stage::ALL {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, stage.label());
        }
    }
}
