//! Integration tests for the Parley API.
//!
//! Each test builds its own router over a fresh orchestrator with in-process
//! responders, and drives it with `tower::ServiceExt::oneshot`.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use parley_api::create_router;
use parley_api::handlers::HealthResponse;
use parley_api::state::AppState;
use parley_chat::{ChatOrchestrator, Responder, ResponderError, ResponderRequest};
use parley_core::config::ParleyConfig;

// =============================================================================
// Helpers
// =============================================================================

/// Replies `"{name} says: {prompt}"`.
struct EchoResponder(&'static str);

#[async_trait]
impl Responder for EchoResponder {
    fn name(&self) -> &str {
        self.0
    }

    async fn respond(&self, request: &ResponderRequest<'_>) -> Result<String, ResponderError> {
        Ok(format!("{} says: {}", self.0, request.prompt))
    }
}

struct DownResponder;

#[async_trait]
impl Responder for DownResponder {
    fn name(&self) -> &str {
        "general"
    }

    async fn respond(&self, _request: &ResponderRequest<'_>) -> Result<String, ResponderError> {
        Err(ResponderError::Network("connection refused".to_string()))
    }
}

/// Deletes every session while "thinking", then replies.
#[derive(Default)]
struct SessionWiper {
    orchestrator: OnceLock<Weak<ChatOrchestrator>>,
}

#[async_trait]
impl Responder for SessionWiper {
    fn name(&self) -> &str {
        "general"
    }

    async fn respond(&self, _request: &ResponderRequest<'_>) -> Result<String, ResponderError> {
        if let Some(orch) = self.orchestrator.get().and_then(Weak::upgrade) {
            for session in orch.list_sessions() {
                orch.delete_session(session.id).unwrap();
            }
        }
        Ok("answered anyway".to_string())
    }
}

fn make_state_with(config: ParleyConfig, general: Arc<dyn Responder>) -> AppState {
    let current: Arc<dyn Responder> = Arc::new(EchoResponder("current_info"));
    let orchestrator = ChatOrchestrator::new(&config, general, current);
    AppState::new(config, orchestrator)
}

fn make_state() -> AppState {
    make_state_with(ParleyConfig::default(), Arc::new(EchoResponder("general")))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::delete(uri).body(Body::empty()).unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn put_json(uri: &str, json: &Value) -> Request<Body> {
    Request::put(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

async fn send(state: &AppState, req: Request<Body>) -> axum::response::Response {
    create_router(state.clone()).oneshot(req).await.unwrap()
}

async fn new_session(state: &AppState) -> String {
    let resp = send(state, post_empty("/sessions")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Health, UI, route
// =============================================================================

#[tokio::test]
async fn test_health() {
    let state = make_state();
    let resp = send(&state, get("/health")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_sessions, 0);
}

#[tokio::test]
async fn test_ui_serves_html() {
    let resp = send(&make_state(), get("/ui")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let body = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(body.contains("<html"));
}

#[tokio::test]
async fn test_route_decision() {
    let state = make_state();
    let resp = send(&state, get("/route?q=Any%20headlines%3F")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["destination"], "current_info");
    assert_eq!(json["matched"], "headlines");

    let resp = send(&state, get("/route?q=Explain%20recursion")).await;
    let json = body_json(resp).await;
    assert_eq!(json["destination"], "general");
    assert!(json["matched"].is_null());
}

#[tokio::test]
async fn test_route_requires_query() {
    let resp = send(&make_state(), get("/route")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "bad_request");
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_general_turn() {
    let state = make_state();
    let resp = send(&state, post_json("/chat", &json!({"text": "Explain recursion"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;

    assert!(Uuid::parse_str(json["session_id"].as_str().unwrap()).is_ok());
    assert_eq!(json["thread"], "main");
    assert_eq!(json["route"]["destination"], "general");
    assert_eq!(json["reply"]["role"], "assistant");
    assert_eq!(json["reply"]["content"], "general says: Explain recursion");
    assert_eq!(json["notices"].as_array().unwrap().len(), 0);
    assert_eq!(
        json["transcript"],
        "User: Explain recursion\nAssistant: general says: Explain recursion"
    );
}

#[tokio::test]
async fn test_chat_continues_session_and_routes_current_info() {
    let state = make_state();
    let first = body_json(send(&state, post_json("/chat", &json!({"text": "hello"}))).await).await;
    let sid = first["session_id"].as_str().unwrap();

    let resp = send(
        &state,
        post_json(
            "/chat",
            &json!({"session_id": sid, "text": "What's the weather today?"}),
        ),
    )
    .await;
    let json = body_json(resp).await;
    assert_eq!(json["session_id"], sid);
    assert_eq!(json["route"]["destination"], "current_info");
    assert_eq!(json["route"]["matched"], "weather");
    assert_eq!(
        json["reply"]["content"],
        "current_info says: What's the weather today?"
    );
    assert_eq!(json["transcript"].as_str().unwrap().lines().count(), 4);
}

#[tokio::test]
async fn test_chat_empty_text_rejected() {
    let resp = send(&make_state(), post_json("/chat", &json!({"text": "   "}))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "bad_request");
    assert_eq!(json["message"], "message cannot be empty");
}

#[tokio::test]
async fn test_chat_malformed_json_rejected() {
    let req = Request::post("/chat")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = send(&make_state(), req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "bad_request");
}

#[tokio::test]
async fn test_chat_invalid_base64_rejected() {
    let state = make_state();
    let resp = send(
        &state,
        post_json(
            "/chat",
            &json!({
                "text": "look",
                "attachments": [{"filename": "a.png", "data_base64": "***not base64***"}]
            }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(resp).await["message"]
        .as_str()
        .unwrap()
        .contains("a.png"));
    assert_eq!(state.orchestrator.session_count(), 0);
}

#[tokio::test]
async fn test_chat_attachments_accepted_and_rejected() {
    let resp = send(
        &make_state(),
        post_json(
            "/chat",
            &json!({
                "text": "summarise",
                "attachments": [
                    {"filename": "notes.txt", "content_type": "text/plain", "data_base64": "aGVsbG8="},
                    {"filename": "pic.png", "data_base64": "AQID"},
                    {"filename": "tool.exe", "data_base64": "AA=="}
                ]
            }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;

    let notices = json["notices"].as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["kind"], "rejected");
    assert!(notices[0]["text"].as_str().unwrap().contains("tool.exe"));
    assert!(json["transcript"]
        .as_str()
        .unwrap()
        .starts_with("User: summarise [attached: notes.txt, pic.png]"));
}

#[tokio::test]
async fn test_chat_responder_failure_is_a_notice() {
    let state = make_state_with(ParleyConfig::default(), Arc::new(DownResponder));
    let resp = send(&state, post_json("/chat", &json!({"text": "Explain recursion"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;

    assert!(json["reply"].is_null());
    let notices = json["notices"].as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["kind"], "error");
    assert!(notices[0]["text"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
    assert_eq!(json["transcript"], "User: Explain recursion");
}

#[tokio::test]
async fn test_chat_unknown_thread_is_404() {
    let state = make_state();
    let sid = new_session(&state).await;
    let resp = send(
        &state,
        post_json("/chat", &json!({"session_id": sid, "thread": "ghost", "text": "hi"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "not_found");
}

#[tokio::test]
async fn test_chat_body_over_limit_is_413() {
    let mut config = ParleyConfig::default();
    config.general.max_body_bytes = 256;
    let state = make_state_with(config, Arc::new(EchoResponder("general")));
    let resp = send(
        &state,
        post_json("/chat", &json!({"text": "x".repeat(1024)})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(resp).await["error"], "payload_too_large");
}

// =============================================================================
// Sessions and messages
// =============================================================================

#[tokio::test]
async fn test_session_lifecycle() {
    let state = make_state();
    let sid = new_session(&state).await;

    let json = body_json(send(&state, get("/sessions")).await).await;
    let sessions = json["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["id"], sid.as_str());
    assert_eq!(sessions[0]["active_thread"], "main");

    let resp = send(&state, delete(&format!("/sessions/{}", sid))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&state, delete(&format!("/sessions/{}", sid))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_session_id_is_400() {
    let resp = send(&make_state(), get("/sessions/not-a-uuid/messages")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_session_messages_is_404() {
    let uri = format!("/sessions/{}/messages", Uuid::new_v4());
    let resp = send(&make_state(), get(&uri)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_messages_transcript_and_clear() {
    let state = make_state();
    let first = body_json(send(&state, post_json("/chat", &json!({"text": "hello"}))).await).await;
    let sid = first["session_id"].as_str().unwrap().to_string();

    let json = body_json(send(&state, get(&format!("/sessions/{}/messages", sid))).await).await;
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");

    let resp = send(&state, get(&format!("/sessions/{}/transcript", sid))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    assert_eq!(text, "User: hello\nAssistant: general says: hello");

    for _ in 0..2 {
        let resp = send(&state, delete(&format!("/sessions/{}/messages", sid))).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
    let json = body_json(send(&state, get(&format!("/sessions/{}/messages", sid))).await).await;
    assert!(json["messages"].as_array().unwrap().is_empty());
}

// =============================================================================
// Threads
// =============================================================================

#[tokio::test]
async fn test_thread_lifecycle() {
    let state = make_state();
    let sid = new_session(&state).await;
    let threads_uri = format!("/sessions/{}/threads", sid);

    let resp = send(&state, post_json(&threads_uri, &json!({"name": "work"}))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body_json(resp).await["threads"].as_array().unwrap().len(), 2);

    let resp = send(&state, post_json(&threads_uri, &json!({"name": "work"}))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(
        &state,
        put_json(&format!("{}/active", threads_uri), &json!({"name": "work"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["threads"][1]["name"], "work");
    assert_eq!(json["threads"][1]["active"], true);

    // Turn without a thread lands in the active one.
    let json = body_json(
        send(&state, post_json("/chat", &json!({"session_id": sid, "text": "hi"}))).await,
    )
    .await;
    assert_eq!(json["thread"], "work");

    let main_msgs = body_json(
        send(&state, get(&format!("/sessions/{}/messages?thread=main", sid))).await,
    )
    .await;
    assert!(main_msgs["messages"].as_array().unwrap().is_empty());

    let resp = send(&state, delete(&format!("{}/main", threads_uri))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&state, delete(&format!("{}/work", threads_uri))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["error"], "conflict");

    let resp = send(&state, delete(&format!("{}/ghost", threads_uri))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_switch_to_unknown_thread_is_404() {
    let state = make_state();
    let sid = new_session(&state).await;
    let resp = send(
        &state,
        put_json(
            &format!("/sessions/{}/threads/active", sid),
            &json!({"name": "nope"}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_thread_name_is_400() {
    let state = make_state();
    let sid = new_session(&state).await;
    let resp = send(
        &state,
        post_json(&format!("/sessions/{}/threads", sid), &json!({"name": "  "})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_reply_survives_session_deleted_mid_turn() {
    let wiper = Arc::new(SessionWiper::default());
    let state = make_state_with(ParleyConfig::default(), wiper.clone());
    let _ = wiper
        .orchestrator
        .set(Arc::downgrade(&state.orchestrator));

    let resp = send(&state, post_json("/chat", &json!({ "text": "hello" }))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["reply"]["content"], "answered anyway");
    assert_eq!(body["transcript"], "");
    assert_eq!(state.orchestrator.session_count(), 0);
}
