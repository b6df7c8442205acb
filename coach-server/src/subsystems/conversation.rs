//! Conversation service - the two operations behind the HTTP surface.
//!
//! `start_chat` registers (or refreshes) a session and opens the interview.
//! `analyze` runs one candidate recording through the gateway and records
//! the resulting exchange as a candidate turn followed by a coach turn.

use bytes::Bytes;
use coach_core::models::sanitize_text;
use coach_core::prompt::opening_line;
use coach_core::{
    stage_for_turn_count, CoachReply, NewSession, Role, SpeechSynthesizer, Stage, Store,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::gateway::{AnalysisInput, Gateway};
use super::session_locks::SessionLocks;
use crate::error::ServiceError;

/// Stored as the candidate turn when the model heard nothing intelligible.
const EMPTY_TRANSCRIPTION: &str = "...";

#[derive(Debug, Clone, Deserialize)]
pub struct StartChatRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub candidate_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub company_type: String,
    #[serde(default, alias = "cv_content")]
    pub resume_text: Option<String>,
}

impl StartChatRequest {
    fn into_new_session(self) -> Result<NewSession, ServiceError> {
        let fields = [
            ("session_id", &self.session_id),
            ("candidate_name", &self.candidate_name),
            ("job_title", &self.job_title),
            ("company_type", &self.company_type),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        Ok(NewSession {
            session_id: self.session_id.trim().to_string(),
            candidate_name: self.candidate_name.trim().to_string(),
            job_title: self.job_title.trim().to_string(),
            company_type: self.company_type.trim().to_string(),
            resume_text: self.resume_text,
        }
        .sanitized())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StartChatResponse {
    pub reply_text: String,
    pub coach_response_text: String,
    pub audio_base64: String,
    pub stage: Stage,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub reply: CoachReply,
    pub audio_base64: String,
    pub stage: Stage,
    pub recovered: bool,
}

/// One uploaded recording.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub session_id: String,
    pub audio: Bytes,
    pub content_type: Option<String>,
}

pub struct ConversationService {
    store: Arc<dyn Store>,
    gateway: Gateway,
    speech: Arc<dyn SpeechSynthesizer>,
    locks: SessionLocks,
    coach_name: String,
    history_limit: u32,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Gateway,
        speech: Arc<dyn SpeechSynthesizer>,
        coach_name: impl Into<String>,
        history_limit: u32,
    ) -> Self {
        Self {
            store,
            gateway,
            speech,
            locks: SessionLocks::new(),
            coach_name: coach_name.into(),
            history_limit: history_limit.max(1),
        }
    }

    pub async fn start_chat(&self, request: StartChatRequest) -> Result<StartChatResponse, ServiceError> {
        let new_session = request.into_new_session()?;
        let session = self.store.upsert_session(new_session).await?;

        let greeting = opening_line(&session, &self.coach_name);
        self.store
            .append(&session.session_id, Role::Coach, &greeting)
            .await?;
        let stage = stage_for_turn_count(self.store.count(&session.session_id).await?);

        tracing::info!(
            session_id = %session.session_id,
            job_title = %session.job_title,
            has_resume = session.resume().is_some(),
            "Interview started"
        );

        let audio_base64 = self.speech.synthesize(&greeting).await;
        Ok(StartChatResponse {
            reply_text: greeting.clone(),
            coach_response_text: greeting,
            audio_base64,
            stage,
        })
    }

    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalyzeResponse, ServiceError> {
        let session_id = request.session_id.trim();
        if session_id.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Missing required field: session_id".to_string(),
            ));
        }
        self.gateway.validate(&request.audio)?;

        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))?;

        let (reply, stage, recovered) = {
            let _guard = self.locks.acquire(session_id).await;

            let history = self.store.recent(session_id, self.history_limit).await?;
            let stage = stage_for_turn_count(self.store.count(session_id).await?);

            let analysis = self
                .gateway
                .analyze(AnalysisInput {
                    session: &session,
                    history,
                    stage,
                    coach_name: &self.coach_name,
                    audio: request.audio,
                    content_type: request.content_type,
                })
                .await?;

            let transcription = sanitize_text(analysis.reply.transcription_user.trim());
            let candidate_text = if transcription.is_empty() {
                EMPTY_TRANSCRIPTION.to_string()
            } else {
                transcription
            };
            let coach_text = sanitize_text(&analysis.reply.coach_response_text);

            self.store
                .append(session_id, Role::Candidate, &candidate_text)
                .await?;
            self.store.append(session_id, Role::Coach, &coach_text).await?;

            (analysis.reply, stage, analysis.recovered)
        };

        tracing::info!(
            session_id = %session_id,
            stage = stage.label(),
            score = reply.score_pronunciation,
            recovered,
            "Answer analyzed"
        );

        let audio_base64 = self.speech.synthesize(&reply.coach_response_text).await;
        Ok(AnalyzeResponse {
            reply,
            audio_base64,
            stage,
            recovered,
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
