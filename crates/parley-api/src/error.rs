//! API error types and JSON error response formatting.
//!
//! Every failure is returned as `{"error": code, "message": text}` with a
//! status code derived from the chat engine error.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use parley_chat::ChatError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 404 Not Found - unknown session or thread.
    NotFound(String),
    /// 409 Conflict - duplicate thread or deleting the last thread.
    Conflict(String),
    /// 413 Payload Too Large - request body or attachment over the limit.
    PayloadTooLarge(String),
    /// 500 Internal Server Error.
    Internal(String),
    /// 502 Bad Gateway - a completion service failed.
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal API error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        match err {
            ChatError::EmptyMessage
            | ChatError::MessageTooLong(_)
            | ChatError::InvalidThreadName
            | ChatError::UnsupportedAttachment(_) => ApiError::BadRequest(message),
            ChatError::AttachmentTooLarge { .. } => ApiError::PayloadTooLarge(message),
            ChatError::SessionNotFound(_) | ChatError::ThreadNotFound(_) => {
                ApiError::NotFound(message)
            }
            ChatError::ThreadExists(_) | ChatError::LastThread => ApiError::Conflict(message),
            ChatError::Responder(_) => ApiError::Upstream(message),
            ChatError::Storage(_) => ApiError::Internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}
