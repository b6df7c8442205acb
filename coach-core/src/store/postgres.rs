use async_trait::async_trait;
use sqlx::PgPool;

use super::{SessionRecords, Store, TurnLog};
use crate::error::CoachError;
use crate::models::{sanitize_text, NewSession, Role, Session, Turn};

/// PostgreSQL-backed store. Holds only the pool; every call round-trips.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TurnRow {
    session_id: String,
    role: String,
    content: String,
    sequence: i64,
}

impl TryFrom<TurnRow> for Turn {
    type Error = CoachError;

    fn try_from(row: TurnRow) -> Result<Self, Self::Error> {
        Ok(Turn {
            session_id: row.session_id,
            role: row.role.parse()?,
            text: row.content,
            sequence: row.sequence,
        })
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionRecords for PgStore {
    async fn upsert_session(&self, session: NewSession) -> Result<Session, CoachError> {
        let session = session.sanitized();
        let row: Session = sqlx::query_as(
            r#"
            INSERT INTO sessions (session_id, candidate_name, job_title, company_type, resume_text, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (session_id) DO UPDATE
            SET candidate_name = EXCLUDED.candidate_name,
                job_title      = EXCLUDED.job_title,
                company_type   = EXCLUDED.company_type,
                resume_text    = EXCLUDED.resume_text
            RETURNING session_id, candidate_name, job_title, company_type, resume_text, created_at
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.candidate_name)
        .bind(&session.job_title)
        .bind(&session.company_type)
        .bind(&session.resume_text)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(session_id = %row.session_id, "Session upserted");
        Ok(row)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, CoachError> {
        let row = sqlx::query_as::<_, Session>(
            "SELECT session_id, candidate_name, job_title, company_type, resume_text, created_at \
             FROM sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl TurnLog for PgStore {
    async fn append(&self, session_id: &str, role: Role, text: &str) -> Result<Turn, CoachError> {
        let row: TurnRow = sqlx::query_as(
            r#"
            INSERT INTO history (session_id, role, content, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING session_id, role, content, sequence
            "#,
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(sanitize_text(text))
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn recent(&self, session_id: &str, limit: u32) -> Result<Vec<Turn>, CoachError> {
        let rows: Vec<TurnRow> = sqlx::query_as(
            r#"
            SELECT session_id, role, content, sequence FROM (
                SELECT session_id, role, content, sequence
                FROM history
                WHERE session_id = $1
                ORDER BY sequence DESC
                LIMIT $2
            ) latest
            ORDER BY sequence ASC
            "#,
        )
        .bind(session_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Turn::try_from).collect()
    }

    async fn count(&self, session_id: &str) -> Result<u64, CoachError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM history WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0.max(0) as u64)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health(&self) -> Result<String, CoachError> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

// ============================================================================
// Live database tests - skipped when PostgreSQL is unreachable
// ============================================================================
