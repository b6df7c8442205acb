//! Speech synthesis for coach replies
//!
//! `SpeechSynthesizer` never fails: any error is logged and turned into an
//! empty audio string so the textual reply still reaches the caller.
//! - **TranslateTtsClient** - Google Translate TTS endpoint, MP3 output
//! - **SilentSynthesizer** - always empty (speech disabled)

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::config::SpeechConfig;

/// Longest text the TTS endpoint accepts per request.
pub const MAX_CHUNK_CHARS: usize = 200;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Base64-encoded audio for `text`, or an empty string on any failure.
    async fn synthesize(&self, text: &str) -> String;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TTS endpoint returned {0}")]
    Status(u16),

    #[error("TTS endpoint returned no audio")]
    EmptyAudio,
}

// ============================================================================
// SilentSynthesizer
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SilentSynthesizer;

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn synthesize(&self, _text: &str) -> String {
        String::new()
    }

    fn name(&self) -> &str {
        "silent"
    }
}

// ============================================================================
// TranslateTtsClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct TranslateTtsClient {
    client: Client,
    base_url: String,
    language: String,
}

impl TranslateTtsClient {
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .user_agent("Mozilla/5.0")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
        })
    }

    /// Fetch MP3 bytes for `text`, one request per chunk, concatenated.
    pub async fn synthesize_bytes(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        let total = chunks.len().to_string();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let response = self
                .client
                .get(format!("{}/translate_tts", self.base_url))
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.language.as_str()),
                    ("q", chunk.as_str()),
                    ("idx", idx.as_str()),
                    ("total", total.as_str()),
                ])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(SpeechError::Status(status.as_u16()));
            }
            audio.extend_from_slice(&response.bytes().await?);
        }

        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        Ok(audio)
    }
}

#[async_trait]
impl SpeechSynthesizer for TranslateTtsClient {
    async fn synthesize(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        match self.synthesize_bytes(text).await {
            Ok(bytes) => general_purpose::STANDARD.encode(bytes),
            Err(e) => {
                tracing::warn!(error = %e, "Speech synthesis failed, replying without audio");
                String::new()
            }
        }
    }

    fn name(&self) -> &str {
        "translate-tts"
    }
}

/// Split text into pieces of at most `max_chars` characters, breaking at
/// whitespace where possible. Newlines are treated as spaces.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
