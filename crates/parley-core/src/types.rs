use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text submitted by the person at the keyboard.
    User,
    /// Reply produced by a responder.
    Assistant,
}

impl Role {
    /// Wire name used by both completion services.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Capitalised label used in rendered transcripts.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of an uploaded file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Document,
}

// =============================================================================
// Attachments
// =============================================================================

/// Content of an attachment after upload processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentPayload {
    /// Raw image bytes, kept untouched.
    Binary(Vec<u8>),
    /// Best-effort decoded document text.
    Text(String),
}

/// A file attached to a user message.
///
/// Created once at upload time and never mutated. Dropped together with the
/// thread that owns the message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub media_kind: MediaKind,
    /// MIME type, e.g. `image/png` or `text/plain`.
    pub media_type: String,
    pub payload: AttachmentPayload,
}

impl Attachment {
    /// Build an image attachment from raw bytes.
    pub fn image(
        filename: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            media_kind: MediaKind::Image,
            media_type: media_type.into(),
            payload: AttachmentPayload::Binary(bytes),
        }
    }

    /// Build a document attachment from decoded text.
    pub fn document(
        filename: impl Into<String>,
        media_type: impl Into<String>,
        text: String,
    ) -> Self {
        Self {
            filename: filename.into(),
            media_kind: MediaKind::Document,
            media_type: media_type.into(),
            payload: AttachmentPayload::Text(text),
        }
    }

    /// Raw bytes of an image payload.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            AttachmentPayload::Binary(b) => Some(b),
            AttachmentPayload::Text(_) => None,
        }
    }

    /// Decoded text of a document payload.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            AttachmentPayload::Text(t) => Some(t),
            AttachmentPayload::Binary(_) => None,
        }
    }

    /// Standard base64 encoding of the payload, for transport.
    pub fn to_base64(&self) -> String {
        match &self.payload {
            AttachmentPayload::Binary(b) => BASE64_STANDARD.encode(b),
            AttachmentPayload::Text(t) => BASE64_STANDARD.encode(t.as_bytes()),
        }
    }

    /// Rebuild an image attachment from a base64 payload.
    pub fn image_from_base64(
        filename: impl Into<String>,
        media_type: impl Into<String>,
        encoded: &str,
    ) -> Result<Self, base64::DecodeError> {
        let bytes = BASE64_STANDARD.decode(encoded)?;
        Ok(Self::image(filename, media_type, bytes))
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        match &self.payload {
            AttachmentPayload::Binary(b) => b.len(),
            AttachmentPayload::Text(t) => t.len(),
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

/// One entry in a conversation thread. Immutable once created.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            attachments,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Vec::new())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Vec::new())
    }
}
