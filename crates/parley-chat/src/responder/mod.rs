//! Responders: one outbound completion call per turn.
//!
//! [`AnthropicResponder`] serves general questions, [`ChatCompletionsResponder`]
//! serves prompts the router flags as needing current information.

mod anthropic;
mod chat_completions;

pub use anthropic::AnthropicResponder;
pub use chat_completions::ChatCompletionsResponder;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use parley_core::types::{Attachment, Message, Role};

use crate::error::ResponderError;

/// Everything a responder needs for one call.
#[derive(Debug, Clone, Copy)]
pub struct ResponderRequest<'a> {
    /// The new user text. Never empty.
    pub prompt: &'a str,
    /// Prior messages of the thread, oldest first, already truncated.
    pub history: &'a [Message],
    /// Attachments of the new user message.
    pub attachments: &'a [Attachment],
}

/// Maps a prompt to a reply through one external service call.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Short name used in logs and notices.
    fn name(&self) -> &str;

    /// Perform the call and return the reply text.
    async fn respond(&self, request: &ResponderRequest<'_>) -> Result<String, ResponderError>;
}

/// One content block of a service reply.
///
/// The reply text must be the first block; any other shape is a parse error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyBlock {
    Text {
        text: String,
    },
    Image {
        #[serde(default)]
        source: Option<serde_json::Value>,
    },
    #[serde(other)]
    Other,
}

/// Extract the reply text from the first block.
pub(crate) fn first_text(blocks: Vec<ReplyBlock>) -> Result<String, ResponderError> {
    match blocks.into_iter().next() {
        Some(ReplyBlock::Text { text }) if !text.trim().is_empty() => Ok(text),
        Some(ReplyBlock::Text { .. }) => Err(ResponderError::Parse(
            "reply text is empty".to_string(),
        )),
        Some(ReplyBlock::Image { .. }) => Err(ResponderError::Parse(
            "first content block is an image, expected text".to_string(),
        )),
        Some(ReplyBlock::Other) => Err(ResponderError::Parse(
            "first content block has an unsupported type".to_string(),
        )),
        None => Err(ResponderError::Parse(
            "response contained no content blocks".to_string(),
        )),
    }
}

/// A history entry reduced to what the services accept.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Turn {
    pub role: Role,
    pub text: String,
}

/// Shape history into a strictly alternating sequence starting with a user
/// turn, and fold a trailing user turn into the new prompt.
///
/// Leading assistant messages are dropped and consecutive messages from the
/// same role are merged. A trailing user message exists when an earlier turn
/// failed upstream; its text is prepended to the new prompt.
pub(crate) fn prepare_turns(history: &[Message], prompt: &str) -> (Vec<Turn>, String) {
    let mut turns: Vec<Turn> = Vec::with_capacity(history.len());
    for msg in history
        .iter()
        .skip_while(|m| m.role == Role::Assistant)
        .filter(|m| !m.content.trim().is_empty())
    {
        match turns.last_mut() {
            Some(last) if last.role == msg.role => {
                last.text.push_str("\n\n");
                last.text.push_str(&msg.content);
            }
            _ => turns.push(Turn {
                role: msg.role,
                text: msg.content.clone(),
            }),
        }
    }

    let prompt = match turns.last() {
        Some(last) if last.role == Role::User => {
            let pending = turns.pop().map(|t| t.text).unwrap_or_default();
            format!("{}\n\n{}", pending, prompt)
        }
        _ => prompt.to_string(),
    };
    (turns, prompt)
}

/// Text form of a document attachment, as sent alongside the prompt.
pub(crate) fn document_text(attachment: &Attachment) -> Option<String> {
    attachment.text().map(|text| {
        format!(
            "Attached document `{}`:\n{}",
            attachment.filename, text
        )
    })
}

pub(crate) fn build_client(timeout_secs: Option<u64>) -> Client {
    let mut builder = Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to build HTTP client with timeout, using defaults");
        Client::new()
    })
}

pub(crate) fn network_error(service: &str, err: reqwest::Error) -> ResponderError {
    if err.is_timeout() {
        ResponderError::Network(format!("{} request timed out: {}", service, err))
    } else {
        ResponderError::Network(format!("{} request failed: {}", service, err))
    }
}

/// Build an upstream error from a non-success response body.
///
/// Understands `{"error": {"message": ...}}`, `{"error": "..."}` and
/// `{"message": ...}`; anything else is passed through verbatim.
pub(crate) fn upstream_error(status: StatusCode, body: &str) -> ResponderError {
    let extracted = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error").filter(|e| e.is_string()))
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });
    let message = match extracted {
        Some(m) => m,
        None if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        None => body.trim().to_string(),
    };
    ResponderError::Upstream {
        status: status.as_u16(),
        message,
    }
}
