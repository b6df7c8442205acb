use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sanitize_text;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub candidate_name: String,
    pub job_title: String,
    pub company_type: String,
    pub resume_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Résumé text, if one was supplied and is not blank.
    pub fn resume(&self) -> Option<&str> {
        self.resume_text
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// Descriptive fields written by an upsert.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NewSession {
    pub session_id: String,
    pub candidate_name: String,
    pub job_title: String,
    pub company_type: String,
    pub resume_text: Option<String>,
}

impl NewSession {
    pub fn sanitized(self) -> Self {
        Self {
            session_id: sanitize_text(&self.session_id),
            candidate_name: sanitize_text(&self.candidate_name),
            job_title: sanitize_text(&self.job_title),
            company_type: sanitize_text(&self.company_type),
            resume_text: self
                .resume_text
                .map(|r| sanitize_text(&r))
                .filter(|r| !r.trim().is_empty()),
        }
    }
}
