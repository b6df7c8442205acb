use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{SessionRecords, Store, TurnLog};
use crate::error::CoachError;
use crate::models::{sanitize_text, NewSession, Role, Session, Turn};

/// In-process store with the same semantics as `PgStore`.
///
/// State is lost on restart; intended for tests and local runs without a
/// database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    sessions: HashMap<String, Session>,
    turns: Vec<Turn>,
    next_sequence: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, CoachError> {
        self.inner
            .lock()
            .map_err(|_| CoachError::Other("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl SessionRecords for MemoryStore {
    async fn upsert_session(&self, session: NewSession) -> Result<Session, CoachError> {
        let session = session.sanitized();
        let mut inner = self.lock()?;
        let created_at = inner
            .sessions
            .get(&session.session_id)
            .map(|s| s.created_at)
            .unwrap_or_else(Utc::now);

        let record = Session {
            session_id: session.session_id.clone(),
            candidate_name: session.candidate_name,
            job_title: session.job_title,
            company_type: session.company_type,
            resume_text: session.resume_text,
            created_at,
        };
        inner.sessions.insert(session.session_id, record.clone());
        Ok(record)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, CoachError> {
        Ok(self.lock()?.sessions.get(session_id).cloned())
    }
}

#[async_trait]
impl TurnLog for MemoryStore {
    async fn append(&self, session_id: &str, role: Role, text: &str) -> Result<Turn, CoachError> {
        let mut inner = self.lock()?;
        inner.next_sequence += 1;
        let turn = Turn {
            session_id: session_id.to_string(),
            role,
            text: sanitize_text(text),
            sequence: inner.next_sequence,
        };
        inner.turns.push(turn.clone());
        Ok(turn)
    }

    async fn recent(&self, session_id: &str, limit: u32) -> Result<Vec<Turn>, CoachError> {
        let inner = self.lock()?;
        let all: Vec<&Turn> = inner
            .turns
            .iter()
            .filter(|t| t.session_id == session_id)
            .collect();
        let skip = all.len().saturating_sub(limit as usize);
        Ok(all.into_iter().skip(skip).cloned().collect())
    }

    async fn count(&self, session_id: &str) -> Result<u64, CoachError> {
        let inner = self.lock()?;
        Ok(inner
            .turns
            .iter()
            .filter(|t| t.session_id == session_id)
            .count() as u64)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health(&self) -> Result<String, CoachError> {
        let _guard = self.lock()?;
        Ok("in-memory".to_string())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
