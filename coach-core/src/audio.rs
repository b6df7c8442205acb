//! Audio intake: size validation and best-effort transcoding to MP3.
//!
//! Browsers hand us whatever container their recorder produced (webm/opus,
//! ogg, mp4...). We try to turn it into mono 24 kHz MP3 with ffmpeg; when
//! that is not possible the original bytes go out with a sniffed content
//! type. Normalization never fails a request.

use bytes::Bytes;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::config::AudioConfig;

/// Content type of normalized output.
pub const NORMALIZED_MIME: &str = "audio/mp3";

/// Content type used when nothing better is known.
pub const DEFAULT_MIME: &str = "audio/webm";

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio too short: {len} bytes (minimum {min})")]
    TooShort { len: usize, min: usize },

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("ffmpeg timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio ready for upload.
#[derive(Debug, Clone)]
pub struct PreparedAudio {
    pub bytes: Bytes,
    pub mime_type: String,
    /// `true` when ffmpeg produced the bytes.
    pub normalized: bool,
}

#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    config: AudioConfig,
}

impl AudioNormalizer {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    /// Reject recordings too small to hold speech, before any upload.
    pub fn validate(&self, raw: &[u8]) -> Result<(), AudioError> {
        let min = self.config.min_audio_bytes.max(1);
        if raw.len() < min {
            return Err(AudioError::TooShort {
                len: raw.len(),
                min,
            });
        }
        Ok(())
    }

    /// Transcode to MP3 when possible, otherwise pass the original through.
    pub async fn normalize(&self, raw: Bytes, content_type: Option<&str>) -> PreparedAudio {
        if self.config.normalize {
            match self.transcode(&raw).await {
                Ok(mp3) => {
                    tracing::debug!(
                        input_bytes = raw.len(),
                        output_bytes = mp3.len(),
                        "Audio normalized to mp3"
                    );
                    return PreparedAudio {
                        bytes: Bytes::from(mp3),
                        mime_type: NORMALIZED_MIME.to_string(),
                        normalized: true,
                    };
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Audio normalization failed, uploading original bytes");
                }
            }
        }

        let mime_type = sniff_mime(&raw, content_type);
        PreparedAudio {
            bytes: raw,
            mime_type,
            normalized: false,
        }
    }

    async fn transcode(&self, raw: &[u8]) -> Result<Vec<u8>, AudioError> {
        // Scratch files live in a TempDir removed on drop, on every return path.
        let scratch = tempfile::Builder::new().prefix("coach-audio").tempdir()?;
        let input = scratch.path().join("input");
        let output = scratch.path().join("output.mp3");
        tokio::fs::write(&input, raw).await?;

        let child = Command::new(&self.config.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(&input)
            .args(["-ac", "1", "-ar", "24000", "-b:a", "64k", "-f", "mp3"])
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let timeout_secs = self.config.ffmpeg_timeout_seconds.max(1);
        let out = tokio::time::timeout(Duration::from_secs(timeout_secs), child)
            .await
            .map_err(|_| AudioError::Timeout(timeout_secs))??;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(AudioError::Ffmpeg(format!(
                "exit {}: {}",
                out.status,
                stderr.trim()
            )));
        }

        let mp3 = tokio::fs::read(&output).await?;
        if mp3.is_empty() {
            return Err(AudioError::Ffmpeg("empty output".to_string()));
        }
        Ok(mp3)
    }
}

/// Best-guess content type from magic bytes, then the client's `audio/*`
/// or `video/webm` header, then [`DEFAULT_MIME`].
pub fn sniff_mime(bytes: &[u8], content_type: Option<&str>) -> String {
    let sniffed = if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        Some("audio/webm")
    } else if bytes.starts_with(b"OggS") {
        Some("audio/ogg")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        Some("audio/wav")
    } else if bytes.starts_with(b"fLaC") {
        Some("audio/flac")
    } else if bytes.starts_with(b"ID3")
        || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
    {
        Some("audio/mp3")
    } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        Some("audio/mp4")
    } else {
        None
    };

    if let Some(mime) = sniffed {
        return mime.to_string();
    }

    match content_type.map(|c| c.split(';').next().unwrap_or("").trim()) {
        Some(c) if c.starts_with("audio/") || c == "video/webm" => c.to_string(),
        _ => DEFAULT_MIME.to_string(),
    }
}
