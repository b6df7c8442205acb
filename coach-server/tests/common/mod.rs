//! Shared stubs for the coach-server integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use coach_core::audio::{AudioNormalizer, PreparedAudio};
use coach_core::config::{AudioConfig, PollConfig};
use coach_core::{
    AssetState, GeminiError, GenerationRequest, MemoryStore, ModelBackend, RemoteAsset,
    SilentSynthesizer, SpeechSynthesizer, Store,
};
use coach_server::subsystems::conversation::{
    AnalyzeRequest, ConversationService, StartChatRequest,
};
use coach_server::subsystems::gateway::Gateway;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const WELL_FORMED_REPLY: &str = r#"{
    "coach_response_text": "Good. What was the hardest bug you fixed?",
    "transcription_user": "I have five years of backend experience.",
    "score_pronunciation": 8,
    "feedback_intonation": "Clear and steady.",
    "feedback_grammar": "No issues.",
    "better_response_example": "I have spent five years building backend systems.",
    "next_step_advice": "Add a concrete example."
}"#;

/// Programmable model backend that records every call.
pub struct StubBackend {
    /// State the asset reports on every status query.
    pub steady_state: AssetState,
    pub fail_upload: bool,
    pub generate_result: Mutex<Result<String, String>>,
    pub uploads: AtomicU32,
    pub status_calls: AtomicU32,
    pub generates: AtomicU32,
    pub deletes: AtomicU32,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl StubBackend {
    pub fn replying(text: &str) -> Self {
        Self {
            steady_state: AssetState::Ready,
            fail_upload: false,
            generate_result: Mutex::new(Ok(text.to_string())),
            uploads: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            generates: AtomicU32::new(0),
            deletes: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn never_ready() -> Self {
        Self {
            steady_state: AssetState::Processing,
            ..Self::replying(WELL_FORMED_REPLY)
        }
    }

    pub fn failing_generation() -> Self {
        let backend = Self::replying("");
        *backend.generate_result.lock().unwrap() = Err("quota exceeded".to_string());
        backend
    }

    pub fn external_calls(&self) -> u32 {
        self.uploads.load(Ordering::SeqCst)
            + self.status_calls.load(Ordering::SeqCst)
            + self.generates.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }

    fn asset(&self, state: AssetState) -> RemoteAsset {
        RemoteAsset {
            name: "files/stub".to_string(),
            uri: "https://files.test/stub".to_string(),
            mime_type: "audio/webm".to_string(),
            state,
        }
    }
}

#[async_trait]
impl ModelBackend for StubBackend {
    async fn upload(&self, _audio: &PreparedAudio) -> Result<RemoteAsset, GeminiError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_upload {
            return Err(GeminiError::Api {
                code: 500,
                message: "upload rejected".to_string(),
            });
        }
        Ok(self.asset(AssetState::Processing))
    }

    async fn asset_state(&self, _asset: &RemoteAsset) -> Result<RemoteAsset, GeminiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.asset(self.steady_state))
    }

    async fn delete(&self, _asset: &RemoteAsset) -> Result<(), GeminiError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeminiError> {
        self.generates.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &*self.generate_result.lock().unwrap() {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(GeminiError::Api {
                code: 429,
                message: message.clone(),
            }),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Synthesizer that returns a fixed payload and counts calls.
pub struct FixedSpeech {
    pub audio: String,
    pub calls: AtomicU32,
}

impl FixedSpeech {
    pub fn new(audio: &str) -> Self {
        Self {
            audio: audio.to_string(),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FixedSpeech {
    async fn synthesize(&self, _text: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.audio.clone()
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub fn fast_poll() -> PollConfig {
    PollConfig {
        max_attempts: 10,
        interval_ms: 1,
        total_budget_ms: 5_000,
    }
}

pub fn audio_config() -> AudioConfig {
    AudioConfig {
        normalize: false,
        ..AudioConfig::default()
    }
}

pub fn service_with(
    backend: Arc<dyn ModelBackend>,
    store: Arc<dyn Store>,
    speech: Arc<dyn SpeechSynthesizer>,
) -> ConversationService {
    let gateway = Gateway::new(backend, AudioNormalizer::new(audio_config()), fast_poll());
    ConversationService::new(store, gateway, speech, "Sarah", 20)
}

pub fn service(backend: Arc<StubBackend>) -> (ConversationService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let svc = service_with(backend, store.clone(), Arc::new(SilentSynthesizer));
    (svc, store)
}

pub fn start_request(session_id: &str) -> StartChatRequest {
    StartChatRequest {
        session_id: session_id.to_string(),
        candidate_name: "Ada".to_string(),
        job_title: "Backend Engineer".to_string(),
        company_type: "Fintech".to_string(),
        resume_text: None,
    }
}

/// A recording large enough to pass validation.
pub fn recording() -> Bytes {
    let mut bytes = b"\x1a\x45\xdf\xa3".to_vec();
    bytes.resize(2048, 0x42);
    Bytes::from(bytes)
}

pub fn analyze_request(session_id: &str) -> AnalyzeRequest {
    AnalyzeRequest {
        session_id: session_id.to_string(),
        audio: recording(),
        content_type: Some("audio/webm".to_string()),
    }
}
