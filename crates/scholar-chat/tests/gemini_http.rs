//! Gemini client tests against an in-process fake `generateContent` endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use scholar_chat::{AnsweringError, AnsweringService, ChatController, GeminiClient, SubmitOutcome};
use scholar_core::types::{KnowledgeContext, Sender};

// =============================================================================
// Helpers
// =============================================================================

const MODEL: &str = "gemini-test";
const ROUTE: &str = "/v1beta/models/gemini-test:generateContent";
const API_KEY: &str = "test-key-123";

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

/// Bind on an ephemeral port and return the base URL.
async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v1beta", addr)
}

fn client(base_url: &str, timeout: Duration) -> GeminiClient {
    GeminiClient::new(API_KEY, base_url, MODEL, timeout).unwrap()
}

async fn answering(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    recorded.requests.lock().unwrap().push((key, body));
    Json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": "Acme U was founded in 1990." }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 120, "candidatesTokenCount": 9 }
    }))
}

fn status_router(status: StatusCode, body: &'static str) -> Router {
    Router::new().route(ROUTE, post(move || async move { (status, body) }))
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_answer_sends_prompt_and_key() {
    let recorded = Recorded::default();
    let router = Router::new()
        .route(ROUTE, post(answering))
        .with_state(recorded.clone());
    let base = spawn_server(router).await;
    let gemini = client(&base, Duration::from_secs(5));

    let answer = gemini
        .answer("Acme U was founded in 1990.", "Acme U", "When was it founded?")
        .await
        .unwrap();
    assert_eq!(answer, "Acme U was founded in 1990.");

    let requests = recorded.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (key, body) = &requests[0];
    assert_eq!(key.as_deref(), Some(API_KEY));
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Acme U was founded in 1990."));
    assert!(prompt.contains("When was it founded?"));
    assert!(prompt.contains("\"Acme U\" assistant"));
}

#[tokio::test]
async fn test_auth_failure() {
    let base = spawn_server(status_router(
        StatusCode::FORBIDDEN,
        r#"{"error":{"code":403,"message":"API key not valid. Please pass a valid API key."}}"#,
    ))
    .await;
    let err = client(&base, Duration::from_secs(5))
        .answer("k", "t", "q")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AnsweringError::Auth("API key not valid. Please pass a valid API key.".to_string())
    );
}

#[tokio::test]
async fn test_rate_limit_uses_retry_after_header() {
    let router = Router::new().route(
        ROUTE,
        post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, "9")],
                "slow down",
            )
                .into_response()
        }),
    );
    let base = spawn_server(router).await;
    let err = client(&base, Duration::from_secs(5))
        .answer("k", "t", "q")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AnsweringError::RateLimited {
            retry_after_secs: Some(9)
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_upstream() {
    let base = spawn_server(status_router(StatusCode::INTERNAL_SERVER_ERROR, "oops")).await;
    let err = client(&base, Duration::from_secs(5))
        .answer("k", "t", "q")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AnsweringError::Upstream {
            status: 500,
            message: "oops".to_string()
        }
    );
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let base = spawn_server(Router::new()).await;
    let err = client(&base, Duration::from_secs(5))
        .answer("k", "t", "q")
        .await
        .unwrap_err();
    assert_eq!(err, AnsweringError::ModelNotFound(MODEL.to_string()));
}

#[tokio::test]
async fn test_malformed_body() {
    let base = spawn_server(status_router(StatusCode::OK, "definitely not json")).await;
    let err = client(&base, Duration::from_secs(5))
        .answer("k", "t", "q")
        .await
        .unwrap_err();
    assert!(matches!(err, AnsweringError::Malformed(_)));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let router = Router::new().route(
        ROUTE,
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({}))
        }),
    );
    let base = spawn_server(router).await;
    let err = client(&base, Duration::from_millis(100))
        .answer("k", "t", "q")
        .await
        .unwrap_err();
    assert_eq!(err, AnsweringError::Timeout(Duration::from_millis(100)));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}/v1beta", addr), Duration::from_secs(5))
        .answer("k", "t", "q")
        .await
        .unwrap_err();
    assert!(matches!(err, AnsweringError::Network(_)));
}

#[tokio::test]
async fn test_controller_with_gemini_end_to_end() {
    let recorded = Recorded::default();
    let router = Router::new()
        .route(ROUTE, post(answering))
        .with_state(recorded.clone());
    let base = spawn_server(router).await;
    let gemini = client(&base, Duration::from_secs(5));

    let mut controller = ChatController::default();
    controller.initialize(KnowledgeContext::new(
        "Acme U",
        "acme.txt",
        "Acme U was founded in 1990.",
    ));
    let outcome = controller
        .submit(&gemini, "When was it founded?")
        .await
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Answered(_)));

    let state = controller.state();
    assert_eq!(state.len(), 3);
    assert_eq!(state.messages[2].sender, Sender::Assistant);
    assert_eq!(state.messages[2].text, "Acme U was founded in 1990.");
    assert_eq!(recorded.requests.lock().unwrap().len(), 1);
}
