//! Durable session and turn storage.
//!
//! `SessionRecords` and `TurnLog` are the two seams the conversation service
//! talks to; `Store` bundles them with a health probe. `PgStore` is the
//! production backend, `MemoryStore` backs tests and `--memory-store` runs.

use async_trait::async_trait;

use crate::error::CoachError;
use crate::models::{NewSession, Role, Session, Turn};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait SessionRecords: Send + Sync {
    /// Create the session or overwrite its descriptive fields.
    /// `created_at` of an existing session is kept.
    async fn upsert_session(&self, session: NewSession) -> Result<Session, CoachError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, CoachError>;
}

#[async_trait]
pub trait TurnLog: Send + Sync {
    /// Append one turn; the store assigns the sequence number.
    async fn append(&self, session_id: &str, role: Role, text: &str) -> Result<Turn, CoachError>;

    /// The last `limit` turns of a session, oldest first.
    async fn recent(&self, session_id: &str, limit: u32) -> Result<Vec<Turn>, CoachError>;

    /// Total number of turns recorded for a session.
    async fn count(&self, session_id: &str) -> Result<u64, CoachError>;
}

#[async_trait]
pub trait Store: SessionRecords + TurnLog {
    /// Backend version string, or an error if the backend is unreachable.
    async fn health(&self) -> Result<String, CoachError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
