use axum::http::StatusCode;
use coach_core::{CoachError, GeminiError};
use thiserror::Error;

/// Failure of a `/start_chat` or `/analyze` call.
///
/// Malformed model output is not an error: it is recovered in the gateway
/// with the fallback reply. Everything here ends the current call only;
/// the session and its history stay intact.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Audio too short: {len} bytes (minimum {min})")]
    AudioTooShort { len: usize, min: usize },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] GeminiError),

    #[error("Audio processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Audio processing timed out after {attempts} status checks")]
    ProcessingTimeout { attempts: u32 },

    #[error("Generation failed: {0}")]
    GenerationFailed(#[source] GeminiError),

    #[error("Store unavailable: {0}")]
    Store(#[from] CoachError),
}

impl ServiceError {
    /// Machine-readable code carried in the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::AudioTooShort { .. } => "audio_too_short",
            ServiceError::SessionNotFound(_) => "session_not_found",
            ServiceError::UploadFailed(_) => "upload_failed",
            ServiceError::ProcessingFailed(_) => "processing_failed",
            ServiceError::ProcessingTimeout { .. } => "processing_timeout",
            ServiceError::GenerationFailed(_) => "generation_failed",
            ServiceError::Store(_) => "store_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) | ServiceError::AudioTooShort { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::UploadFailed(_)
            | ServiceError::ProcessingFailed(_)
            | ServiceError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
            ServiceError::ProcessingTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message safe to hand to a client. Upstream and store failures carry
    /// text from third parties, so those stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            ServiceError::InvalidInput(_)
            | ServiceError::AudioTooShort { .. }
            | ServiceError::SessionNotFound(_)
            | ServiceError::ProcessingTimeout { .. } => self.to_string(),
            ServiceError::UploadFailed(_) => "Could not upload the recording".to_string(),
            ServiceError::ProcessingFailed(_) => "The recording could not be processed".to_string(),
            ServiceError::GenerationFailed(_) => "The coach could not produce feedback".to_string(),
            ServiceError::Store(_) => "Conversation storage is unavailable".to_string(),
        }
    }

    /// JSON body returned to the client.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.client_message(),
            "code": self.code(),
            "status": "error",
        })
    }
}
