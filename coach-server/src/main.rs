use std::sync::Arc;

use clap::Parser;
use coach_core::audio::AudioNormalizer;
use coach_core::gemini::GeminiConfig;
use coach_core::{
    CoachConfig, GeminiClient, MemoryStore, PgStore, SilentSynthesizer, SpeechSynthesizer, Store,
    TranslateTtsClient,
};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use coach_server::http::{start_http_server, HttpState};
use coach_server::subsystems::conversation::ConversationService;
use coach_server::subsystems::gateway::Gateway;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "coach.toml")]
    config: String,

    /// Check database connectivity and exit
    #[arg(long)]
    health: bool,

    /// Keep sessions in process memory instead of PostgreSQL
    #[arg(long)]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience - production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match CoachConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let store: Arc<dyn Store> = if args.memory_store {
        tracing::warn!("Using in-memory store: sessions are lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        let pool = match coach_core::db::create_pool(&config.database).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        };

        if args.health {
            match coach_core::db::health_check(&pool).await {
                Ok(v) => println!("✅ PostgreSQL connected: {}", v),
                Err(e) => {
                    println!("❌ PostgreSQL connection failed: {}", e);
                    std::process::exit(1);
                }
            }
            return Ok(());
        }

        coach_core::db::ensure_schema(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let gemini = match GeminiClient::new(GeminiConfig::new(None, &config.gemini)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to create Gemini client: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(model = gemini.model(), "Gemini client ready");

    let speech: Arc<dyn SpeechSynthesizer> = if config.speech.enabled {
        match TranslateTtsClient::new(&config.speech) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::warn!("Speech disabled: failed to create TTS client: {}", e);
                Arc::new(SilentSynthesizer)
            }
        }
    } else {
        Arc::new(SilentSynthesizer)
    };

    let gateway = Gateway::new(
        Arc::new(gemini),
        AudioNormalizer::new(config.audio.clone()),
        config.poll.clone(),
    );
    let service = ConversationService::new(
        store.clone(),
        gateway,
        speech.clone(),
        config.service.coach_name.clone(),
        config.gemini.history_limit,
    );

    tracing::info!(
        store = store.name(),
        speech = speech.name(),
        coach = %config.service.coach_name,
        "Coach service initialized"
    );

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = Arc::new(HttpState {
        service: Arc::new(service),
        config,
    });
    start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
