//! Route handlers for the Parley API.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_chat::{
    ChatError, Notice, RouteDecision, SessionSummary, ThreadSummary, TurnOutcome, TurnRequest, Upload,
};
use parley_core::types::{MediaKind, Message, Role};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RouteParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadParams {
    pub thread: Option<String>,
}

/// A file carried inside a chat request.
#[derive(Debug, Deserialize)]
pub struct AttachmentUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<Uuid>,
    pub thread: Option<String>,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadNameRequest {
    pub name: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub filename: String,
    pub media_kind: MediaKind,
    pub media_type: String,
    pub size_bytes: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub attachments: Vec<AttachmentInfo>,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            role: message.role,
            content: message.content.clone(),
            attachments: message
                .attachments
                .iter()
                .map(|a| AttachmentInfo {
                    filename: a.filename.clone(),
                    media_kind: a.media_kind,
                    media_type: a.media_type.clone(),
                    size_bytes: a.size(),
                })
                .collect(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub session_id: Uuid,
    pub thread: String,
    pub route: RouteDecision,
    pub reply: Option<MessageResponse>,
    pub notices: Vec<Notice>,
    /// Rendered transcript of the thread after this turn.
    pub transcript: String,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub session_id: Uuid,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize)]
pub struct ThreadsResponse {
    pub session_id: Uuid,
    pub threads: Vec<ThreadSummary>,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - liveness plus a session count.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.orchestrator.session_count(),
    })
}

/// GET /ui - serve the self-contained chat page.
pub async fn ui() -> impl IntoResponse {
    Html(crate::ui::CHAT_HTML)
}

/// GET /route?q= - which responder a prompt would go to.
pub async fn route(
    State(state): State<AppState>,
    Query(params): Query<RouteParams>,
) -> Result<Json<RouteDecision>, ApiError> {
    let q = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query parameter 'q' is required".to_string()))?;
    Ok(Json(state.orchestrator.route(&q)))
}

/// POST /chat - run one turn.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, ApiError> {
    let Json(body) = payload?;

    let mut uploads = Vec::with_capacity(body.attachments.len());
    for attachment in body.attachments {
        let bytes = BASE64_STANDARD
            .decode(attachment.data_base64.trim())
            .map_err(|e| {
                ApiError::BadRequest(format!(
                    "Attachment '{}' is not valid base64: {}",
                    attachment.filename, e
                ))
            })?;
        uploads.push(Upload::new(attachment.filename, attachment.content_type, bytes));
    }

    let outcome = state
        .orchestrator
        .handle_turn(TurnRequest {
            session_id: body.session_id,
            thread: body.thread,
            text: body.text,
            uploads,
        })
        .await?;

    let transcript = match state
        .orchestrator
        .transcript(outcome.session_id, Some(outcome.thread.as_str()))
    {
        Ok(transcript) => transcript,
        Err(e @ ChatError::Storage(_)) => return Err(e.into()),
        // Deleted while the reply was in flight; the reply itself still goes back.
        Err(e) => {
            tracing::warn!(
                session_id = %outcome.session_id,
                thread = %outcome.thread,
                error = %e,
                "Transcript unavailable after turn"
            );
            String::new()
        }
    };
    Ok(Json(turn_response(outcome, transcript)))
}

fn turn_response(outcome: TurnOutcome, transcript: String) -> TurnResponse {
    TurnResponse {
        session_id: outcome.session_id,
        thread: outcome.thread,
        route: outcome.route,
        reply: outcome.reply.as_ref().map(MessageResponse::from),
        notices: outcome.notices,
        transcript,
    }
}

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.orchestrator.list_sessions(),
    })
}

/// POST /sessions
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionSummary>), ApiError> {
    let summary = state.orchestrator.create_session()?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// DELETE /sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id)?;
    state.orchestrator.delete_session(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sessions/{id}/messages?thread=
pub async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ThreadParams>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let id = parse_session_id(&id)?;
    let messages = state.orchestrator.history(id, params.thread.as_deref())?;
    Ok(Json(MessagesResponse {
        session_id: id,
        messages: messages.iter().map(MessageResponse::from).collect(),
    }))
}

/// DELETE /sessions/{id}/messages?thread= - clear a thread.
pub async fn clear_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ThreadParams>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id)?;
    state.orchestrator.clear(id, params.thread.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sessions/{id}/transcript?thread= - plain-text transcript.
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ThreadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_session_id(&id)?;
    let transcript = state.orchestrator.transcript(id, params.thread.as_deref())?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        transcript,
    ))
}

/// GET /sessions/{id}/threads
pub async fn list_threads(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadsResponse>, ApiError> {
    let id = parse_session_id(&id)?;
    threads_response(&state, id).map(Json)
}

/// POST /sessions/{id}/threads
pub async fn create_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ThreadNameRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ThreadsResponse>), ApiError> {
    let id = parse_session_id(&id)?;
    let Json(body) = payload?;
    state.orchestrator.create_thread(id, &body.name)?;
    Ok((StatusCode::CREATED, Json(threads_response(&state, id)?)))
}

/// PUT /sessions/{id}/threads/active
pub async fn switch_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ThreadNameRequest>, JsonRejection>,
) -> Result<Json<ThreadsResponse>, ApiError> {
    let id = parse_session_id(&id)?;
    let Json(body) = payload?;
    state.orchestrator.switch_thread(id, &body.name)?;
    threads_response(&state, id).map(Json)
}

/// DELETE /sessions/{id}/threads/{name}
pub async fn delete_thread(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id)?;
    state.orchestrator.delete_thread(id, &name)?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Helpers --

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::BadRequest(format!("Invalid session id: {}", raw)))
}

fn threads_response(state: &AppState, id: Uuid) -> Result<ThreadsResponse, ApiError> {
    Ok(ThreadsResponse {
        session_id: id,
        threads: state.orchestrator.list_threads(id)?,
    })
}
