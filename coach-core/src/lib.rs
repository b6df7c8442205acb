pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod models;
pub mod prompt;
pub mod speech;
pub mod stage;
pub mod store;

pub use config::CoachConfig;
pub use error::CoachError;
pub use gemini::{
    AssetState, GeminiClient, GeminiConfig, GeminiError, GenerationRequest, ModelBackend,
    RemoteAsset,
};
pub use models::{CoachReply, NewSession, Role, Session, Turn};
pub use speech::{SilentSynthesizer, SpeechSynthesizer, TranslateTtsClient};
pub use stage::{stage_for_turn_count, Stage};
pub use store::{MemoryStore, PgStore, SessionRecords, Store, TurnLog};
