//! Coach HTTP API
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`. The inner functions are
//! directly testable without axum dispatch.
//!
//! Endpoints:
//! - POST /start_chat - register a session and open the interview
//! - POST /analyze    - multipart upload of one candidate answer
//! - GET  /health     - store status
//! - GET  /version    - server version info

use std::sync::Arc;

use anyhow::Result;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use coach_core::CoachConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ServiceError;
use crate::subsystems::conversation::{AnalyzeRequest, ConversationService, StartChatRequest};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub service: Arc<ConversationService>,
    pub config: CoachConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let max_upload = state.config.http.max_upload_bytes;
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/start_chat", post(start_chat_handler))
        .route("/analyze", post(analyze_handler))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Coach HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

fn error_response(err: &ServiceError) -> (StatusCode, serde_json::Value) {
    if err.status().is_server_error() {
        tracing::error!(code = err.code(), error = %err, "Request failed");
    } else {
        tracing::warn!(code = err.code(), error = %err, "Request rejected");
    }
    (err.status(), err.to_body())
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check - probes the store.
pub async fn health_inner(service: &ConversationService) -> (StatusCode, serde_json::Value) {
    let store = service.store();
    match store.health().await {
        Ok(version) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store.name(),
                "store_version": version,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "store": store.name(),
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version - returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "coach",
    })
}

pub async fn start_chat_inner(
    service: &ConversationService,
    req: StartChatRequest,
) -> (StatusCode, serde_json::Value) {
    match service.start_chat(req).await {
        Ok(response) => (StatusCode::OK, serde_json::json!(response)),
        Err(e) => error_response(&e),
    }
}

pub async fn analyze_inner(
    service: &ConversationService,
    req: AnalyzeRequest,
) -> (StatusCode, serde_json::Value) {
    match service.analyze(req).await {
        Ok(response) => (StatusCode::OK, serde_json::json!(response)),
        Err(e) => error_response(&e),
    }
}

/// Collect `session_id` and the audio part (`audio`, or `file`) from the form.
pub async fn read_analyze_form(mut form: Multipart) -> Result<AnalyzeRequest, ServiceError> {
    let mut session_id = None;
    let mut audio = None;
    let mut content_type = None;

    while let Some(field) = form
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("session_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
                session_id = Some(text);
            }
            Some("audio") | Some("file") => {
                content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
                audio = Some(bytes);
            }
            _ => {}
        }
    }

    let session_id = session_id.ok_or_else(|| {
        ServiceError::InvalidInput("Missing required field: session_id".to_string())
    })?;
    let audio =
        audio.ok_or_else(|| ServiceError::InvalidInput("Missing required field: audio".to_string()))?;

    Ok(AnalyzeRequest {
        session_id,
        audio,
        content_type,
    })
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.service).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn start_chat_handler(
    State(state): State<Arc<HttpState>>,
    req: Result<Json<StartChatRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match req {
        Ok(Json(req)) => start_chat_inner(&state.service, req).await,
        Err(rejection) => error_response(&ServiceError::InvalidInput(rejection.body_text())),
    };
    (status, Json(body))
}

pub async fn analyze_handler(
    State(state): State<Arc<HttpState>>,
    form: Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let parsed = match form {
        Ok(form) => read_analyze_form(form).await,
        Err(rejection) => Err(ServiceError::InvalidInput(rejection.body_text())),
    };
    let (status, body) = match parsed {
        Ok(req) => analyze_inner(&state.service, req).await,
        Err(e) => error_response(&e),
    };
    (status, Json(body))
}

// ============================================================================
// Unit Tests - call inner functions directly
// ============================================================================
