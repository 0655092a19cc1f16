//! Error types for the conversation engine.

use parley_core::error::ParleyError;

/// Failure of a single outbound responder call.
///
/// Never retried. The orchestrator turns it into the error notice of the turn.
#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    /// The request could not be completed (DNS, connect, timeout, reset).
    #[error("network error: {0}")]
    Network(String),
    /// The service answered with a non-success status.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
    /// The response body did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
    /// No API key is available for the service.
    #[error("responder not configured: {0}")]
    NotConfigured(String),
}

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("thread not found: {0}")]
    ThreadNotFound(String),
    #[error("thread already exists: {0}")]
    ThreadExists(String),
    #[error("cannot delete the last remaining thread")]
    LastThread,
    #[error("thread name cannot be empty")]
    InvalidThreadName,
    #[error("unsupported attachment: {0}")]
    UnsupportedAttachment(String),
    #[error("attachment {filename} is {size} bytes, limit is {limit} bytes")]
    AttachmentTooLarge {
        filename: String,
        size: usize,
        limit: usize,
    },
    #[error(transparent)]
    Responder(#[from] ResponderError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<ParleyError> for ChatError {
    fn from(err: ParleyError) -> Self {
        ChatError::Storage(err.to_string())
    }
}
