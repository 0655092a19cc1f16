//! Current-information responder backed by a chat-completions endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use parley_core::config::CurrentResponderConfig;
use parley_core::types::MediaKind;

use super::{
    build_client, document_text, first_text, network_error, prepare_turns, upstream_error,
    ReplyBlock, Responder, ResponderRequest,
};
use crate::error::ResponderError;

const SERVICE: &str = "current_info";

/// Responder for news, weather and other time-sensitive prompts.
#[derive(Clone)]
pub struct ChatCompletionsResponder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    system: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionsResponder {
    pub fn from_config(config: &CurrentResponderConfig) -> Self {
        Self {
            client: build_client(config.timeout_secs),
            endpoint: config.base_url.clone(),
            api_key: config.resolved_api_key(),
            model: config.model.clone(),
            system: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn build_request(&self, request: &ResponderRequest<'_>) -> ChatCompletionRequest {
        let (turns, prompt) = prepare_turns(request.history, request.prompt);

        let mut messages = Vec::with_capacity(turns.len() + 2);
        if !self.system.trim().is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: self.system.clone(),
            });
        }
        messages.extend(turns.into_iter().map(|turn| WireMessage {
            role: turn.role.as_str(),
            content: turn.text,
        }));

        // The endpoint takes plain text; images are referenced by name only.
        let mut content = prompt;
        for attachment in request.attachments {
            match attachment.media_kind {
                MediaKind::Document => {
                    if let Some(text) = document_text(attachment) {
                        content.push_str("\n\n");
                        content.push_str(&text);
                    }
                }
                MediaKind::Image => {
                    content.push_str(&format!("\n\n[Attached image: {}]", attachment.filename));
                }
            }
        }
        messages.push(WireMessage {
            role: "user",
            content,
        });

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl Responder for ChatCompletionsResponder {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn respond(&self, request: &ResponderRequest<'_>) -> Result<String, ResponderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ResponderError::NotConfigured(
                "no API key for the current-information responder".to_string(),
            )
        })?;

        let body = self.build_request(request);
        tracing::debug!(
            model = %body.model,
            messages = body.messages.len(),
            "Sending current-information completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(SERVICE, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| network_error(SERVICE, e))?;

        if !status.is_success() {
            return Err(upstream_error(status, &text));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text).map_err(|e| {
            ResponderError::Parse(format!("invalid current-information response: {}", e))
        })?;
        extract_reply(parsed)
    }
}

fn extract_reply(response: ChatCompletionResponse) -> Result<String, ResponderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ResponderError::Parse("response contained no choices".to_string()))?;

    let blocks = match choice.message.content {
        Some(MessageContent::Text(text)) => vec![ReplyBlock::Text { text }],
        Some(MessageContent::Parts(parts)) => parts,
        None => {
            return Err(ResponderError::Parse(
                "choice message has no content".to_string(),
            ))
        }
    };
    let mut reply = first_text(blocks)?;

    if !response.citations.is_empty() {
        reply.push_str("\n\nSources:");
        for (i, url) in response.citations.iter().enumerate() {
            reply.push_str(&format!("\n[{}] {}", i + 1, url));
        }
    }
    Ok(reply)
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    /// Source URLs some providers attach to grounded answers.
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ReplyBlock>),
}
