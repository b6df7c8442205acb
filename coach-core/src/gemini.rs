//! Gemini client - Files API upload/poll/delete and `generateContent`
//!
//! Provides a `ModelBackend` trait, the seam the analysis gateway talks to,
//! and `GeminiClient`, its implementation over the Gemini REST API:
//! - **upload** - `POST /upload/v1beta/files` (raw media upload)
//! - **asset_state** - `GET /v1beta/files/<id>`
//! - **delete** - `DELETE /v1beta/files/<id>`
//! - **generate** - `POST /v1beta/models/<model>:generateContent` with a JSON
//!   response schema
//!
//! The client is a stateless handle: a pooled `reqwest::Client` plus config.
//! Nothing is cached between calls, so one instance is shared by every request.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::audio::PreparedAudio;
use crate::config::ModelConfig;
use crate::models::{CoachReply, Role, Turn};

const API_KEY_HEADER: &str = "x-goog-api-key";

// ============================================================================
// ModelBackend trait
// ============================================================================

/// Abstraction over the remote file-processing + generation service.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Upload audio; the returned asset is usually still processing.
    async fn upload(&self, audio: &PreparedAudio) -> Result<RemoteAsset, GeminiError>;

    /// Fetch the current state of an uploaded asset.
    async fn asset_state(&self, asset: &RemoteAsset) -> Result<RemoteAsset, GeminiError>;

    /// Delete an uploaded asset.
    async fn delete(&self, asset: &RemoteAsset) -> Result<(), GeminiError>;

    /// Run one generation call and return the raw model text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeminiError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error + domain types
// ============================================================================

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Upload response did not describe a file")]
    MissingFile,

    #[error("Request blocked by the model: {0}")]
    Blocked(String),

    #[error("Model returned no candidates")]
    EmptyResponse,
}

impl From<reqwest::Error> for GeminiError {
    fn from(err: reqwest::Error) -> Self {
        GeminiError::Http(err.without_url())
    }
}

/// Processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Uploading,
    Processing,
    Ready,
    Failed,
}

impl AssetState {
    /// Map the Files API `state` string.
    pub fn from_api(state: Option<&str>) -> Self {
        match state {
            Some("ACTIVE") => AssetState::Ready,
            Some("FAILED") => AssetState::Failed,
            Some("PROCESSING") => AssetState::Processing,
            _ => AssetState::Uploading,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetState::Ready | AssetState::Failed)
    }
}

/// Handle to an uploaded file. Only valid for the call that created it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAsset {
    /// Resource name, `files/<id>`.
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: AssetState,
}

/// Everything needed for one `generateContent` call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: String,
    /// Prior turns, oldest first.
    pub history: Vec<Turn>,
    pub asset: RemoteAsset,
    pub prompt: String,
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl GeminiConfig {
    pub fn new(api_key: Option<String>, model: &ModelConfig) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .map(|k| k.trim().to_string())
            .unwrap_or_default();

        Self {
            api_key,
            model: model.model.clone(),
            base_url: model.base_url.trim_end_matches('/').to_string(),
            timeout_seconds: model.timeout_seconds,
        }
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: Option<FileResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    state: Option<String>,
}

impl FileResource {
    fn into_asset(self, fallback_mime: &str) -> RemoteAsset {
        RemoteAsset {
            state: AssetState::from_api(self.state.as_deref()),
            mime_type: if self.mime_type.is_empty() {
                fallback_mime.to_string()
            } else {
                self.mime_type
            },
            name: self.name,
            uri: self.uri,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: SystemInstruction,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, PartialEq)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

/// History as Gemini `contents`, followed by the recording and prompt.
/// Consecutive turns from the same side are merged into one content.
fn build_contents(history: &[Turn], asset: &RemoteAsset, prompt: &str) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::with_capacity(history.len() + 1);

    let mut push = |role: Role, parts: Vec<Part>| match contents.last_mut() {
        Some(last) if last.role == role.model_role() => last.parts.extend(parts),
        _ => contents.push(Content {
            role: role.model_role(),
            parts,
        }),
    };

    for turn in history {
        push(
            turn.role,
            vec![Part::Text {
                text: turn.text.clone(),
            }],
        );
    }

    push(
        Role::Candidate,
        vec![
            Part::File {
                file_data: FileData {
                    mime_type: asset.mime_type.clone(),
                    file_uri: asset.uri.clone(),
                },
            },
            Part::Text {
                text: prompt.to_string(),
            },
        ],
    );

    contents
}

// ============================================================================
// GeminiClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        if config.api_key.is_empty() {
            return Err(GeminiError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a client against a custom base URL (for testing / proxies).
    pub fn with_base_url(mut config: GeminiConfig, base_url: String) -> Result<Self, GeminiError> {
        config.base_url = base_url.trim_end_matches('/').to_string();
        Self::new(config)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.config.base_url, name)
    }

    /// Turn a non-success response into `GeminiError::Api`.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GeminiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);

        let (code, message) = error_detail
            .map(|e| (e.code, e.message))
            .unwrap_or((status.as_u16(), error_body));

        tracing::error!(code = code, message = %message, "Gemini API error");
        Err(GeminiError::Api { code, message })
    }
}

#[async_trait]
impl ModelBackend for GeminiClient {
    async fn upload(&self, audio: &PreparedAudio) -> Result<RemoteAsset, GeminiError> {
        let url = format!("{}/upload/v1beta/files?uploadType=media", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .header("X-Goog-Upload-Protocol", "raw")
            .header(reqwest::header::CONTENT_TYPE, audio.mime_type.as_str())
            .body(audio.bytes.clone())
            .send()
            .await?;

        let upload: UploadResponse = Self::check(response).await?.json().await?;
        let asset = upload
            .file
            .ok_or(GeminiError::MissingFile)?
            .into_asset(&audio.mime_type);

        tracing::debug!(name = %asset.name, state = ?asset.state, bytes = audio.bytes.len(), "Audio uploaded");
        Ok(asset)
    }

    async fn asset_state(&self, asset: &RemoteAsset) -> Result<RemoteAsset, GeminiError> {
        let response = self
            .client
            .get(self.file_url(&asset.name))
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .send()
            .await?;
        let file: FileResource = Self::check(response).await?.json().await?;
        Ok(file.into_asset(&asset.mime_type))
    }

    async fn delete(&self, asset: &RemoteAsset) -> Result<(), GeminiError> {
        let response = self
            .client
            .delete(self.file_url(&asset.name))
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeminiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let body = GenerateRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part::Text {
                    text: request.system_instruction.clone(),
                }],
            },
            contents: build_contents(&request.history, &request.asset, &request.prompt),
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: CoachReply::response_schema(),
            },
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .json(&body)
            .send()
            .await?;
        let generated: GenerateResponse = Self::check(response).await?.json().await?;

        if let Some(reason) = generated.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GeminiError::Blocked(reason));
        }

        let candidate = generated
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or(GeminiError::EmptyResponse)?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================
