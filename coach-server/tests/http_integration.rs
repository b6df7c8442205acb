//! HTTP integration tests for the coach REST API
//!
//! Full handler dispatch through the Axum router via `oneshot`, backed by the
//! in-memory store and a stub model backend.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use coach_core::gemini::GeminiConfig;
use coach_core::{CoachConfig, GeminiClient, MemoryStore, SilentSynthesizer};
use coach_server::http::{build_router, HttpState};
use common::*;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "coach-test-boundary";

fn make_http_state(backend: Arc<StubBackend>) -> Arc<HttpState> {
    let (svc, _store) = service(backend);
    Arc::new(HttpState {
        service: Arc::new(svc),
        config: CoachConfig::default(),
    })
}

fn multipart_body(session_id: Option<&str>, audio: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(id) = session_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\n{id}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"answer.webm\"\r\nContent-Type: audio/webm\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(audio);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn analyze_post(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn start_chat_post(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/start_chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn start_chat_payload(session_id: &str) -> serde_json::Value {
    json!({
        "session_id": session_id,
        "candidate_name": "Ada",
        "job_title": "Backend Engineer",
        "company_type": "Fintech",
        "cv_content": "Built payment systems in Rust."
    })
}

// ===========================================================================
// TEST 1: GET /version - 200 with version info
// ===========================================================================
#[tokio::test]
async fn test_version_endpoint() {
    let app = build_router(make_http_state(Arc::new(StubBackend::replying(WELL_FORMED_REPLY))));

    let response = app
        .oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["version"].is_string());
}

// ===========================================================================
// TEST 2: GET /health - memory store reports healthy
// ===========================================================================
#[tokio::test]
async fn test_health_endpoint() {
    let app = build_router(make_http_state(Arc::new(StubBackend::replying(WELL_FORMED_REPLY))));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

// ===========================================================================
// TEST 3: POST /start_chat - opening line mentions the résumé
// ===========================================================================
#[tokio::test]
async fn test_start_chat_endpoint() {
    let app = build_router(make_http_state(Arc::new(StubBackend::replying(WELL_FORMED_REPLY))));

    let response = app
        .oneshot(start_chat_post(start_chat_payload("http-start")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["reply_text"],
        "Hi Ada. I'm Sarah. Let's start the interview for Backend Engineer. \
         I've read through your résumé. Tell me about yourself."
    );
    assert_eq!(body["stage"], "introduction");
    assert_eq!(body["audio_base64"], "");
}

// ===========================================================================
// TEST 4: POST /start_chat - malformed JSON is a 400 with an error body
// ===========================================================================
#[tokio::test]
async fn test_start_chat_malformed_json() {
    let app = build_router(make_http_state(Arc::new(StubBackend::replying(WELL_FORMED_REPLY))));

    let request = Request::builder()
        .method("POST")
        .uri("/start_chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "invalid_input");
    assert_eq!(body["status"], "error");
}

// ===========================================================================
// TEST 5: POST /analyze - empty audio is 400 with no external calls
// ===========================================================================
#[tokio::test]
async fn test_analyze_empty_audio() {
    let backend = Arc::new(StubBackend::replying(WELL_FORMED_REPLY));
    let app = build_router(make_http_state(backend.clone()));

    app.clone()
        .oneshot(start_chat_post(start_chat_payload("http-empty")))
        .await
        .unwrap();

    let response = app
        .oneshot(analyze_post(multipart_body(Some("http-empty"), b"")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "audio_too_short");
    assert_eq!(backend.external_calls(), 0);
}

// ===========================================================================
// TEST 6: POST /analyze - missing session_id part is 400
// ===========================================================================
#[tokio::test]
async fn test_analyze_missing_session_id() {
    let backend = Arc::new(StubBackend::replying(WELL_FORMED_REPLY));
    let app = build_router(make_http_state(backend.clone()));

    let response = app
        .oneshot(analyze_post(multipart_body(None, &recording())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "invalid_input");
    assert_eq!(backend.external_calls(), 0);
}

// ===========================================================================
// TEST 7: POST /analyze - unknown session is 404
// ===========================================================================
#[tokio::test]
async fn test_analyze_unknown_session() {
    let app = build_router(make_http_state(Arc::new(StubBackend::replying(WELL_FORMED_REPLY))));

    let response = app
        .oneshot(analyze_post(multipart_body(Some("nobody"), &recording())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "session_not_found");
}

// ===========================================================================
// TEST 8: POST /analyze - success returns the flat reply payload
// ===========================================================================
#[tokio::test]
async fn test_analyze_success() {
    let app = build_router(make_http_state(Arc::new(StubBackend::replying(WELL_FORMED_REPLY))));

    app.clone()
        .oneshot(start_chat_post(start_chat_payload("http-ok")))
        .await
        .unwrap();

    let response = app
        .oneshot(analyze_post(multipart_body(Some("http-ok"), &recording())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    for field in [
        "coach_response_text",
        "transcription_user",
        "feedback_intonation",
        "feedback_grammar",
        "better_response_example",
        "next_step_advice",
        "audio_base64",
    ] {
        assert!(body[field].is_string(), "missing {}", field);
    }
    assert_eq!(body["score_pronunciation"], 8.0);
    assert_eq!(body["recovered"], false);
    assert_eq!(body["stage"], "introduction");
}

// ===========================================================================
// TEST 9: POST /analyze - processing timeout is a 504
// ===========================================================================
#[tokio::test]
async fn test_analyze_timeout_status() {
    let app = build_router(make_http_state(Arc::new(StubBackend::never_ready())));

    app.clone()
        .oneshot(start_chat_post(start_chat_payload("http-slow")))
        .await
        .unwrap();

    let response = app
        .oneshot(analyze_post(multipart_body(Some("http-slow"), &recording())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = json_body(response).await;
    assert_eq!(body["code"], "processing_timeout");
    assert_eq!(body["status"], "error");
}

// ===========================================================================
// TEST 10: POST /analyze - an unreachable model never leaks the API key
// ===========================================================================
#[tokio::test]
async fn test_analyze_upload_failure_hides_api_key() {
    let client = GeminiClient::new(GeminiConfig {
        api_key: "AIzaSECRET-HTTP-KEY".to_string(),
        model: "gemini-2.5-flash".to_string(),
        base_url: "http://127.0.0.1:1".to_string(),
        timeout_seconds: 2,
    })
    .unwrap();
    let svc = service_with(
        Arc::new(client),
        Arc::new(MemoryStore::new()),
        Arc::new(SilentSynthesizer),
    );
    let app = build_router(Arc::new(HttpState {
        service: Arc::new(svc),
        config: CoachConfig::default(),
    }));

    app.clone()
        .oneshot(start_chat_post(start_chat_payload("http-leak")))
        .await
        .unwrap();

    let response = app
        .oneshot(analyze_post(multipart_body(Some("http-leak"), &recording())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["code"], "upload_failed");
    assert!(!body.to_string().contains("AIzaSECRET"));
    assert!(!body.to_string().contains("127.0.0.1"));
}
