use payment_chat_gateway::message::{ChatResponse, EndResponse, ErrorBody, HealthResponse};
use payment_chat_gateway::routes::{REQUEST_ID_HEADER, cors_layer, create_router};
use payment_chat_gateway::services::assistant::PaymentAssistant;
use payment_chat_gateway::services::orchestrator::{
    Orchestrator, OrchestratorError, OrchestratorResult,
};
use payment_chat_gateway::state::AppState;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tower::util::ServiceExt;

fn static_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static")
}

fn app_with(orchestrator: Arc<dyn Orchestrator>) -> Router {
    create_router(static_dir()).with_state(Arc::new(AppState::new(orchestrator)))
}

fn reply_map(session_id: &str, reply: &str) -> OrchestratorResult {
    match json!({ "session_id": session_id, "reply": reply, "intent": "echo", "ended": false }) {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Records every call and echoes the message back.
#[derive(Default)]
struct RecordingOrchestrator {
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingOrchestrator {
    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Orchestrator for RecordingOrchestrator {
    async fn process_user_query(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<OrchestratorResult, OrchestratorError> {
        self.calls
            .lock()
            .unwrap()
            .push((message.to_string(), session_id.to_string()));
        Ok(reply_map(session_id, &format!("echo: {message}")))
    }
}

struct FailingOrchestrator {
    error: fn() -> OrchestratorError,
}

#[async_trait]
impl Orchestrator for FailingOrchestrator {
    async fn process_user_query(
        &self,
        _message: &str,
        _session_id: &str,
    ) -> Result<OrchestratorResult, OrchestratorError> {
        Err((self.error)())
    }
}

struct FixedOrchestrator(Value);

#[async_trait]
impl Orchestrator for FixedOrchestrator {
    async fn process_user_query(
        &self,
        _message: &str,
        _session_id: &str,
    ) -> Result<OrchestratorResult, OrchestratorError> {
        match &self.0 {
            Value::Object(map) => Ok(map.clone()),
            _ => Err(OrchestratorError::Internal("not an object".to_string())),
        }
    }
}

/// Parks every turn for the session "slow" until released.
struct GatedOrchestrator {
    release: Notify,
}

#[async_trait]
impl Orchestrator for GatedOrchestrator {
    async fn process_user_query(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<OrchestratorResult, OrchestratorError> {
        if session_id == "slow" {
            self.release.notified().await;
        }
        Ok(reply_map(session_id, message))
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

#[tokio::test]
async fn health_is_ok_regardless_of_orchestrator() {
    let app = app_with(Arc::new(FailingOrchestrator {
        error: || OrchestratorError::Internal("down".to_string()),
    }));

    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"status": "ok"}));
}

#[tokio::test]
async fn chat_forwards_message_and_session_once() {
    let orchestrator = Arc::new(RecordingOrchestrator::default());
    let app = app_with(orchestrator.clone());

    let (status, body) = post_json(
        app,
        "/chat",
        json!({"message": "hello", "session_id": "abc123"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        orchestrator.calls(),
        vec![("hello".to_string(), "abc123".to_string())]
    );
    let chat: ChatResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        chat,
        ChatResponse {
            session_id: "abc123".to_string(),
            reply: "echo: hello".to_string(),
            intent: "echo".to_string(),
            ended: false,
        }
    );
}

#[tokio::test]
async fn chat_internal_failure_returns_500_with_detail() {
    let messages: [fn() -> OrchestratorError; 3] = [
        || OrchestratorError::Internal("boom".to_string()),
        || OrchestratorError::Internal("ledger timeout after 30s".to_string()),
        || OrchestratorError::Internal("quote \" and ünïcode".to_string()),
    ];

    for error in messages {
        let expected = error().to_string();
        let app = app_with(Arc::new(FailingOrchestrator { error }));
        let (status, body) = post_json(
            app,
            "/chat",
            json!({"message": "hello", "session_id": "abc123"}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let err: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.detail, expected);
    }
}

#[tokio::test]
async fn end_uses_the_same_error_translation() {
    let app = app_with(Arc::new(FailingOrchestrator {
        error: || OrchestratorError::Internal("store unavailable".to_string()),
    }));
    let (status, body) = post_json(app, "/end", json!({"session_id": "abc123"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let err: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(err.detail, "store unavailable");

    let app = app_with(Arc::new(FailingOrchestrator {
        error: || OrchestratorError::SessionNotFound("abc123".to_string()),
    }));
    let (status, body) = post_json(app, "/end", json!({"session_id": "abc123"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let err: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(err.detail, "session `abc123` not found");

    let app = app_with(Arc::new(FailingOrchestrator {
        error: || OrchestratorError::InvalidInput("session_id cannot be empty".to_string()),
    }));
    let (status, _) = post_json(app, "/end", json!({"session_id": ""})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn end_sends_the_end_command_for_any_session() {
    let orchestrator = Arc::new(RecordingOrchestrator::default());
    let ids = ["abc123", "never-seen-before", "ümlaut id", "42"];

    for id in ids {
        let app = app_with(orchestrator.clone());
        let (status, body) = post_json(app, "/end", json!({"session_id": id})).await;
        assert_eq!(status, StatusCode::OK);
        let end: EndResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(end.session_id, id);
    }

    let expected: Vec<(String, String)> = ids
        .iter()
        .map(|id| ("end".to_string(), id.to_string()))
        .collect();
    assert_eq!(orchestrator.calls(), expected);
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let orchestrator = Arc::new(RecordingOrchestrator::default());

    let (status, body) = post_json(
        app_with(orchestrator.clone()),
        "/chat",
        json!({"message": "hello"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let err: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert!(err.detail.contains("session_id"));

    let request = Request::builder()
        .method("POST")
        .uri("/end")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(app_with(orchestrator.clone()), request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(orchestrator.calls().is_empty());
}

#[tokio::test]
async fn result_keys_must_match_response_schema() {
    let extra = json!({"session_id": "s", "reply": "r", "intent": "i", "ended": false, "extra": 1});
    let (status, body) = post_json(
        app_with(Arc::new(FixedOrchestrator(extra))),
        "/chat",
        json!({"message": "hello", "session_id": "s"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let err: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert!(err.detail.starts_with("response schema mismatch"));

    let missing = json!({"session_id": "s", "reply": "r"});
    let (status, _) = post_json(
        app_with(Arc::new(FixedOrchestrator(missing))),
        "/end",
        json!({"session_id": "s"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn index_and_static_assets_are_served() {
    let app = app_with(Arc::new(RecordingOrchestrator::default()));

    let (status, body) = get(app.clone(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("Payment Assistant"));

    let (status, _) = get(app.clone(), "/static/app.js").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(app, "/static/missing.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn index_is_404_when_asset_directory_is_empty() {
    let empty = std::env::temp_dir().join(format!("gateway-static-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&empty).await.unwrap();

    let app = create_router(&empty).with_state(Arc::new(AppState::new(Arc::new(
        RecordingOrchestrator::default(),
    ))));
    let (status, _) = get(app, "/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    tokio::fs::remove_dir_all(&empty).await.unwrap();
}

#[tokio::test]
async fn request_id_is_generated_or_echoed() {
    let app = app_with(Arc::new(RecordingOrchestrator::default()));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let generated = response.headers().get(REQUEST_ID_HEADER).unwrap();
    assert!(uuid::Uuid::parse_str(generated.to_str().unwrap()).is_ok());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, "trace-me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "trace-me");
}

#[tokio::test]
async fn distinct_sessions_do_not_block_each_other() {
    let orchestrator = Arc::new(GatedOrchestrator {
        release: Notify::new(),
    });
    let app = app_with(orchestrator.clone());

    let slow = tokio::spawn(post_json(
        app.clone(),
        "/chat",
        json!({"message": "wait", "session_id": "slow"}),
    ));

    let (status, _) = tokio::time::timeout(
        Duration::from_secs(5),
        post_json(app, "/chat", json!({"message": "go", "session_id": "fast"})),
    )
    .await
    .expect("fast session was blocked behind slow session");
    assert_eq!(status, StatusCode::OK);
    assert!(!slow.is_finished());

    orchestrator.release.notify_one();
    let (status, _) = slow.await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn payment_assistant_end_to_end() {
    let assistant = Arc::new(PaymentAssistant::new(Duration::from_secs(60)));
    let app = app_with(assistant.clone());

    let (status, body) = post_json(
        app.clone(),
        "/chat",
        json!({"message": "I want a refund", "session_id": "user-1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let chat: ChatResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(chat.intent, "refund");
    assert!(chat.reply.contains("transaction ID"));
    assert!(assistant.sessions().contains("user-1"));

    let (status, body) = post_json(
        app.clone(),
        "/chat",
        json!({"message": "   ", "session_id": "user-1"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let err: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(err.detail, "message cannot be empty");

    let (status, body) = post_json(app, "/end", json!({"session_id": "user-1"})).await;
    assert_eq!(status, StatusCode::OK);
    let end: EndResponse = serde_json::from_slice(&body).unwrap();
    assert!(end.ended);
    assert_eq!(end.intent, "end");
    assert!(!assistant.sessions().contains("user-1"));
}

async fn preflight(allow_origins: &[&str], origin: &str) -> axum::http::Response<Body> {
    let allow_origins: Vec<String> = allow_origins.iter().map(|o| o.to_string()).collect();
    let app = app_with(Arc::new(RecordingOrchestrator::default()))
        .layer(cors_layer(&allow_origins).unwrap());

    app.oneshot(
        Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header(ORIGIN, origin)
            .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn cors_is_off_without_configured_origins() {
    let response = preflight(&[], "https://shop.example.com").await;
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

    let response = preflight(&["", "  "], "https://shop.example.com").await;
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn cors_wildcard_allows_any_origin() {
    let response = preflight(&["*"], "https://anywhere.example.org").await;
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://anywhere.example.org"
    );
}

#[tokio::test]
async fn cors_allow_list_only_echoes_listed_origins() {
    let allowed = ["http://localhost:3000", "https://pay.example.com"];

    let response = preflight(&allowed, "https://pay.example.com").await;
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://pay.example.com"
    );

    let response = preflight(&allowed, "https://evil.example.net").await;
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[test]
fn cors_rejects_invalid_origin_entries() {
    assert!(cors_layer(&["bad\nvalue".to_string()]).is_err());
    assert!(cors_layer(&["https://ok.example.com".to_string()]).is_ok());
}
