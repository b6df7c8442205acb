//! coach-cli - command-line client for the interview coach server
//!
//! # Subcommands
//! - `start`   - open an interview session and print the coach's greeting
//! - `analyze` - upload a recorded answer and print the feedback
//! - `status`  - show server health
//! - `doctor`  - check the local environment (API key, ffmpeg)

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

/// Prefix every Google AI Studio key starts with.
const API_KEY_PREFIX: &str = "AIza";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "coach-cli", version, about = "Interview coach command-line client")]
struct Cli {
    /// Coach HTTP server URL (overrides COACH_HTTP_URL env var)
    #[arg(long, env = "COACH_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start (or restart) an interview session
    Start {
        /// Candidate name
        #[arg(long)]
        name: String,

        /// Job title being interviewed for
        #[arg(long)]
        job: String,

        /// Kind of company doing the hiring
        #[arg(long, default_value = "Tech company")]
        company: String,

        /// Plain-text résumé to share with the coach
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Reuse an existing session id instead of generating one
        #[arg(long)]
        session_id: Option<String>,

        /// Write the spoken greeting (MP3) to this file
        #[arg(long)]
        audio_out: Option<PathBuf>,
    },

    /// Upload a recorded answer for analysis
    Analyze {
        /// Session id printed by `start`
        session_id: String,

        /// Recorded answer (webm, ogg, wav, mp3, m4a...)
        audio: PathBuf,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,

        /// Write the spoken coach reply (MP3) to this file
        #[arg(long)]
        audio_out: Option<PathBuf>,
    },

    /// Show coach server status
    Status,

    /// Check the local environment
    Doctor {
        /// ffmpeg executable to probe
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: String,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartChatResponse {
    pub reply_text: String,
    #[serde(default)]
    pub audio_base64: String,
    #[serde(default)]
    pub stage: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeResponse {
    pub coach_response_text: String,
    #[serde(default)]
    pub transcription_user: String,
    #[serde(default)]
    pub score_pronunciation: f64,
    #[serde(default)]
    pub feedback_intonation: String,
    #[serde(default)]
    pub feedback_grammar: String,
    #[serde(default)]
    pub better_response_example: String,
    #[serde(default)]
    pub next_step_advice: String,
    #[serde(default)]
    pub audio_base64: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub recovered: bool,
}

// ============================================================================
// Doctor checks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub label: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl Check {
    fn symbol(&self) -> &'static str {
        match self.status {
            CheckStatus::Pass => "✅",
            CheckStatus::Warn => "⚠️ ",
            CheckStatus::Fail => "❌",
        }
    }
}

/// Validate the Gemini API key without ever printing it.
pub fn check_api_key(key: Option<&str>) -> Check {
    let label = "GOOGLE_API_KEY";
    match key.map(str::trim) {
        None | Some("") => Check {
            label,
            status: CheckStatus::Fail,
            detail: "not set; add GOOGLE_API_KEY=<key> to .env or the environment".to_string(),
        },
        Some(k) if k.starts_with(API_KEY_PREFIX) => Check {
            label,
            status: CheckStatus::Pass,
            detail: "present".to_string(),
        },
        Some(_) => Check {
            label,
            status: CheckStatus::Warn,
            detail: format!(
                "present but does not start with '{}'; check you copied the whole key",
                API_KEY_PREFIX
            ),
        },
    }
}

/// First line of `ffmpeg -version`, if it looks like ffmpeg output.
pub fn ffmpeg_version_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| line.starts_with("ffmpeg version"))
        .map(str::to_string)
}

fn check_ffmpeg(ffmpeg: &str) -> Check {
    let label = "ffmpeg";
    match Command::new(ffmpeg).arg("-version").output() {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            match ffmpeg_version_line(&stdout) {
                Some(version) => Check {
                    label,
                    status: CheckStatus::Pass,
                    detail: version,
                },
                None => Check {
                    label,
                    status: CheckStatus::Warn,
                    detail: format!("{} ran but did not report a version", ffmpeg),
                },
            }
        }
        Ok(output) => Check {
            label,
            status: CheckStatus::Warn,
            detail: format!("{} -version exited with {}", ffmpeg, output.status),
        },
        Err(e) => Check {
            label,
            status: CheckStatus::Fail,
            detail: format!(
                "{} not found ({}); audio will be uploaded without normalization",
                ffmpeg, e
            ),
        },
    }
}

fn check_dotenv(loaded: bool) -> Check {
    if loaded {
        Check {
            label: ".env",
            status: CheckStatus::Pass,
            detail: "loaded".to_string(),
        }
    } else {
        Check {
            label: ".env",
            status: CheckStatus::Warn,
            detail: "no .env file in the current directory; using the process environment"
                .to_string(),
        }
    }
}

fn do_doctor(ffmpeg: &str) -> anyhow::Result<()> {
    let loaded = dotenvy::dotenv().is_ok();
    let key = std::env::var("GOOGLE_API_KEY").ok();

    let checks = vec![
        check_dotenv(loaded),
        check_api_key(key.as_deref()),
        check_ffmpeg(ffmpeg),
    ];

    for check in &checks {
        println!("{} {:<15} {}", check.symbol(), check.label, check.detail);
    }

    if checks.iter().any(|c| c.status == CheckStatus::Fail) {
        eprintln!("\ncoach-cli: environment is not ready");
        std::process::exit(1);
    }
    println!("\nEnvironment ready.");
    Ok(())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Content type for an audio file, by extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("ogg") | Some("oga") | Some("opus") => "audio/ogg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("flac") => "audio/flac",
        _ => "audio/webm",
    }
}

/// Human-readable rendering of an analysis.
pub fn format_feedback(reply: &AnalyzeResponse) -> String {
    let mut out = String::new();
    if reply.recovered {
        out.push_str("(the coach could not process that answer)\n\n");
    }
    out.push_str(&format!("You said:     {}\n", reply.transcription_user));
    out.push_str(&format!("Score:        {:.1}/10\n", reply.score_pronunciation));
    if !reply.feedback_intonation.is_empty() {
        out.push_str(&format!("Intonation:   {}\n", reply.feedback_intonation));
    }
    if !reply.feedback_grammar.is_empty() {
        out.push_str(&format!("Grammar:      {}\n", reply.feedback_grammar));
    }
    if !reply.better_response_example.is_empty() {
        out.push_str(&format!("Try saying:   {}\n", reply.better_response_example));
    }
    if !reply.next_step_advice.is_empty() {
        out.push_str(&format!("Next step:    {}\n", reply.next_step_advice));
    }
    out.push_str(&format!("\nCoach: {}", reply.coach_response_text));
    out
}

fn write_audio(path: &Path, audio_base64: &str) -> anyhow::Result<()> {
    if audio_base64.is_empty() {
        eprintln!("coach-cli: server returned no audio");
        return Ok(());
    }
    let bytes = general_purpose::STANDARD.decode(audio_base64)?;
    std::fs::write(path, bytes)?;
    eprintln!("Audio written to {}", path.display());
    Ok(())
}

fn fail_on_error(resp: reqwest::blocking::Response) -> reqwest::blocking::Response {
    if resp.status().is_success() {
        return resp;
    }
    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    let message = body["error"].as_str().unwrap_or("unknown error");
    let code = body["code"].as_str().unwrap_or("?");
    eprintln!("coach-cli: server returned {} ({}): {}", status, code, message);
    std::process::exit(1);
}

fn do_start(
    server: &str,
    name: &str,
    job: &str,
    company: &str,
    resume: Option<&Path>,
    session_id: Option<String>,
    audio_out: Option<&Path>,
) -> anyhow::Result<()> {
    let resume_text = resume.map(std::fs::read_to_string).transpose()?;
    let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let url = format!("{}/start_chat", server);
    let body = serde_json::json!({
        "session_id": session_id,
        "candidate_name": name,
        "job_title": job,
        "company_type": company,
        "resume_text": resume_text,
    });

    let resp = match client(30)?.post(&url).json(&body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("coach-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };
    let started: StartChatResponse = fail_on_error(resp).json()?;

    println!("Session: {}", session_id);
    println!("Stage:   {}", started.stage);
    println!("\nCoach: {}", started.reply_text);

    if let Some(path) = audio_out {
        write_audio(path, &started.audio_base64)?;
    }
    Ok(())
}

fn do_analyze(
    server: &str,
    session_id: &str,
    audio: &Path,
    json_output: bool,
    audio_out: Option<&Path>,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(audio)?;
    let file_name = audio
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("answer.webm")
        .to_string();

    let part = reqwest::blocking::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_for_path(audio))?;
    let form = reqwest::blocking::multipart::Form::new()
        .text("session_id", session_id.to_string())
        .part("audio", part);

    let url = format!("{}/analyze", server);
    // Upload, remote processing and speech synthesis all happen in one call.
    let resp = match client(180)?.post(&url).multipart(form).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("coach-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };
    let body: serde_json::Value = fail_on_error(resp).json()?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let reply: AnalyzeResponse = serde_json::from_value(body)?;
        println!("{}", format_feedback(&reply));
        if let Some(path) = audio_out {
            write_audio(path, &reply.audio_base64)?;
        }
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client(10)?.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Coach server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:        {}", body["store"].as_str().unwrap_or("?"));
            println!("Store info:   {}", body["store_version"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("coach-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("coach-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Start {
            name,
            job,
            company,
            resume,
            session_id,
            audio_out,
        } => do_start(
            &server,
            &name,
            &job,
            &company,
            resume.as_deref(),
            session_id,
            audio_out.as_deref(),
        ),
        Commands::Analyze {
            session_id,
            audio,
            json,
            audio_out,
        } => do_analyze(&server, &session_id, &audio, json, audio_out.as_deref()),
        Commands::Status => do_status(&server),
        Commands::Doctor { ffmpeg } => do_doctor(&ffmpeg),
    };

    if let Err(e) = result {
        eprintln!("coach-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
