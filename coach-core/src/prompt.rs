use crate::models::Session;
use crate::stage::Stage;

/// Text part sent alongside the uploaded recording.
pub const ANALYZE_PROMPT: &str = "Analyze.";

/// Build the system instruction for one analysis call.
pub fn system_instruction(session: &Session, stage: Stage, coach_name: &str) -> String {
    let mut prompt = format!(
        "ROLE: Coach {coach}, recruiter at a {company}. Interviewing {name} for {job}.\n\
         STYLE: Short questions (1-2 sentences MAX). One at a time. Tough on English.\n\
         STAGE: {stage}. {instruction}\n",
        coach = coach_name,
        company = session.company_type,
        name = session.candidate_name,
        job = session.job_title,
        stage = stage.label(),
        instruction = stage.instruction(),
    );

    if let Some(resume) = session.resume() {
        prompt.push_str(&format!(
            "KEY CONTEXT: {name}'s résumé is provided below. Use the experience, skills and \
             achievements it lists to make every better_response_example specific to this \
             candidate.\n--- RESUME ---\n{resume}\n--- END RESUME ---\n",
            name = session.candidate_name,
            resume = resume,
        ));
    }

    prompt.push_str(
        "OUTPUT: JSON with fields: coach_response_text, transcription_user, \
         score_pronunciation (0-10), feedback_intonation, feedback_grammar, \
         better_response_example, next_step_advice.",
    );
    prompt
}

/// Opening line spoken by the coach when a session starts.
pub fn opening_line(session: &Session, coach_name: &str) -> String {
    let resume_note = if session.resume().is_some() {
        " I've read through your résumé."
    } else {
        ""
    };
    format!(
        "Hi {}. I'm {}. Let's start the interview for {}.{} Tell me about yourself.",
        session.candidate_name, coach_name, session.job_title, resume_note
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(resume: Option<&str>) -> Session {
        Session {
            session_id: "s1".to_string(),
            candidate_name: "Ada".to_string(),
            job_title: "Backend Engineer".to_string(),
            company_type: "fintech startup".to_string(),
            resume_text: resume.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_opening_line_without_resume() {
        assert_eq!(
            opening_line(&session(None), "Sarah"),
            "Hi Ada. I'm Sarah. Let's start the interview for Backend Engineer. Tell me about yourself."
        );
    }

    #[test]
    fn test_opening_line_mentions_resume() {
        let line = opening_line(&session(Some("10 years of Rust")), "Sarah");
        assert!(line.contains("résumé"));
        assert!(line.ends_with("Tell me about yourself."));
    }

    #[test]
    fn test_system_instruction_carries_stage_and_resume() {
        let prompt = system_instruction(&session(Some("Led payments team")), Stage::Challenge, "Sarah");
        assert!(prompt.contains("Interviewing Ada for Backend Engineer"));
        assert!(prompt.contains("STAGE: challenge."));
        assert!(prompt.contains("Led payments team"));
        assert!(prompt.contains("score_pronunciation (0-10)"));
    }

    #[test]
    fn test_system_instruction_omits_empty_resume() {
        let prompt = system_instruction(&session(Some("  ")), Stage::Introduction, "Sarah");
        assert!(!prompt.contains("RESUME"));
    }
}
