use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use parley_core::types::Message;

use crate::attachment::Upload;
use crate::router::RouteDecision;
use crate::thread::ThreadBook;

// =============================================================================
// Turn input / output
// =============================================================================

/// One submission from an input surface.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// Existing session to continue. `None`, unknown or expired starts a new one.
    pub session_id: Option<Uuid>,
    /// Target thread. `None` means the active thread.
    pub thread: Option<String>,
    pub text: String,
    pub uploads: Vec<Upload>,
}

impl TurnRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn in_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn in_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    pub fn with_upload(mut self, upload: Upload) -> Self {
        self.uploads.push(upload);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// The responder call failed; the turn has no reply.
    Error,
    /// An upload was not attached.
    Rejected,
}

/// Something the user should be told about a turn besides the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }

    pub fn rejected(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Rejected,
            text: text.into(),
        }
    }
}

/// Result of one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: Uuid,
    /// Thread the turn was appended to.
    pub thread: String,
    pub route: RouteDecision,
    /// The stored assistant message, absent when the responder failed.
    pub reply: Option<Message>,
    pub notices: Vec<Notice>,
}

impl TurnOutcome {
    pub fn is_answered(&self) -> bool {
        self.reply.is_some()
    }

    pub fn error_notice(&self) -> Option<&Notice> {
        self.notices.iter().find(|n| n.kind == NoticeKind::Error)
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Conversation state of one client.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub threads: ThreadBook,
    pub started_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub turn_count: u64,
}

impl ChatSession {
    pub fn new(default_thread: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            threads: ThreadBook::new(default_thread),
            started_at: now,
            last_message_at: now,
            turn_count: 0,
        }
    }

    /// Idle for longer than `timeout_minutes` at `now`. Zero never expires.
    pub fn is_expired(&self, timeout_minutes: u32, now: DateTime<Utc>) -> bool {
        timeout_minutes > 0
            && now - self.last_message_at > Duration::minutes(i64::from(timeout_minutes))
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            started_at: self.started_at.to_rfc3339(),
            last_message_at: self.last_message_at.to_rfc3339(),
            turn_count: self.turn_count,
            thread_count: self.threads.len(),
            message_count: self.threads.message_count(),
            active_thread: self.threads.active_name().to_string(),
        }
    }
}

/// Listing entry for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub started_at: String,
    pub last_message_at: String,
    pub turn_count: u64,
    pub thread_count: usize,
    pub message_count: usize,
    pub active_thread: String,
}
