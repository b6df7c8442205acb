//! Analysis gateway - one recording in, one structured coaching reply out
//!
//! Steps, strictly in order:
//! 1. normalize the audio (never fails, see `coach_core::audio`)
//! 2. upload it to the model's file service
//! 3. poll the uploaded file until it is ready, failed, or the budget runs out
//! 4. generate a reply conditioned on session, stage and recent history
//! 5. parse the reply, substituting the fallback on malformed output
//!
//! The uploaded file is deleted after step 2 on every path. Nothing is
//! persisted here; the conversation service records turns.

use bytes::Bytes;
use coach_core::audio::{AudioError, AudioNormalizer};
use coach_core::config::PollConfig;
use coach_core::extract::parse_reply;
use coach_core::prompt::{system_instruction, ANALYZE_PROMPT};
use coach_core::{
    AssetState, CoachReply, GeminiError, GenerationRequest, ModelBackend, RemoteAsset, Session,
    Stage, Turn,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

use crate::error::ServiceError;

/// Terminal result of waiting on an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Ready(RemoteAsset),
    Failed(RemoteAsset),
    TimedOut { attempts: u32 },
}

/// One analysis call's inputs.
#[derive(Debug, Clone)]
pub struct AnalysisInput<'a> {
    pub session: &'a Session,
    pub history: Vec<Turn>,
    pub stage: Stage,
    pub coach_name: &'a str,
    pub audio: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub reply: CoachReply,
    /// `true` when the model output was malformed and the fallback was used.
    pub recovered: bool,
}

pub struct Gateway {
    backend: Arc<dyn ModelBackend>,
    normalizer: AudioNormalizer,
    poll: PollConfig,
}

impl Gateway {
    pub fn new(backend: Arc<dyn ModelBackend>, normalizer: AudioNormalizer, poll: PollConfig) -> Self {
        Self {
            backend,
            normalizer,
            poll,
        }
    }

    /// Reject empty or too-short recordings before anything leaves the process.
    pub fn validate(&self, audio: &[u8]) -> Result<(), ServiceError> {
        self.normalizer.validate(audio).map_err(|e| match e {
            AudioError::TooShort { len, min } => ServiceError::AudioTooShort { len, min },
            other => ServiceError::InvalidInput(other.to_string()),
        })
    }

    pub async fn analyze(&self, input: AnalysisInput<'_>) -> Result<Analysis, ServiceError> {
        self.validate(&input.audio)?;

        let prepared = self
            .normalizer
            .normalize(input.audio.clone(), input.content_type.as_deref())
            .await;

        let asset = self
            .backend
            .upload(&prepared)
            .await
            .map_err(ServiceError::UploadFailed)?;

        tracing::info!(
            session_id = %input.session.session_id,
            asset = %asset.name,
            mime_type = %prepared.mime_type,
            normalized = prepared.normalized,
            "Audio uploaded"
        );

        let result = self.wait_and_generate(&input, asset.clone()).await;

        if let Err(e) = self.backend.delete(&asset).await {
            tracing::warn!(asset = %asset.name, error = %e, "Failed to delete uploaded audio");
        }

        let raw = result?;
        let parsed = parse_reply(&raw);
        Ok(Analysis {
            reply: parsed.reply,
            recovered: parsed.recovered,
        })
    }

    async fn wait_and_generate(
        &self,
        input: &AnalysisInput<'_>,
        asset: RemoteAsset,
    ) -> Result<String, ServiceError> {
        let ready = match poll_until_ready(self.backend.as_ref(), asset, &self.poll).await {
            Ok(PollOutcome::Ready(asset)) => asset,
            Ok(PollOutcome::Failed(asset)) => {
                return Err(ServiceError::ProcessingFailed(format!(
                    "file {} was rejected by the model service",
                    asset.name
                )))
            }
            Ok(PollOutcome::TimedOut { attempts }) => {
                return Err(ServiceError::ProcessingTimeout { attempts })
            }
            Err(e) => return Err(ServiceError::ProcessingFailed(e.to_string())),
        };

        let request = GenerationRequest {
            system_instruction: system_instruction(input.session, input.stage, input.coach_name),
            history: input.history.clone(),
            asset: ready,
            prompt: ANALYZE_PROMPT.to_string(),
        };

        self.backend
            .generate(&request)
            .await
            .map_err(ServiceError::GenerationFailed)
    }
}

enum PollStep {
    Pending,
    Query(GeminiError),
}

async fn check_once(
    backend: &dyn ModelBackend,
    asset: &RemoteAsset,
    attempts: &AtomicU32,
) -> Result<RemoteAsset, PollStep> {
    let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
    let current = backend.asset_state(asset).await.map_err(PollStep::Query)?;
    tracing::debug!(asset = %asset.name, attempt, state = ?current.state, "Polled asset state");
    if current.state.is_terminal() {
        Ok(current)
    } else {
        Err(PollStep::Pending)
    }
}

/// Wait for an uploaded asset to become ready.
///
/// Queries the asset state up to `max_attempts` times, `interval_ms` apart,
/// and gives up once `total_budget_ms` has elapsed. A query error ends the
/// wait immediately.
pub async fn poll_until_ready(
    backend: &dyn ModelBackend,
    asset: RemoteAsset,
    config: &PollConfig,
) -> Result<PollOutcome, GeminiError> {
    match asset.state {
        AssetState::Ready => return Ok(PollOutcome::Ready(asset)),
        AssetState::Failed => return Ok(PollOutcome::Failed(asset)),
        _ => {}
    }

    let max_attempts = config.max_attempts.max(1);
    let interval = Duration::from_millis(config.interval_ms);
    let attempts = AtomicU32::new(0);

    let polling = async {
        tokio::time::sleep(interval).await;
        let strategy =
            FixedInterval::new(interval).take(max_attempts.saturating_sub(1) as usize);
        let (backend, asset_ref, counter) = (backend, &asset, &attempts);
        RetryIf::spawn(
            strategy,
            move || check_once(backend, asset_ref, counter),
            |step: &PollStep| matches!(step, PollStep::Pending),
        )
        .await
    };

    let outcome =
        match tokio::time::timeout(Duration::from_millis(config.total_budget_ms), polling).await {
            Ok(Ok(current)) if current.state == AssetState::Ready => PollOutcome::Ready(current),
            Ok(Ok(current)) => PollOutcome::Failed(current),
            Ok(Err(PollStep::Query(e))) => return Err(e),
            Ok(Err(PollStep::Pending)) | Err(_) => PollOutcome::TimedOut {
                attempts: attempts.load(Ordering::SeqCst),
            },
        };

    if let PollOutcome::TimedOut { attempts } = &outcome {
        tracing::warn!(asset = %asset.name, attempts, "Asset still processing, giving up");
    }
    Ok(outcome)
}

// ============================================================================
// TESTS
// ============================================================================
