//! General-purpose responder backed by an Anthropic Messages-style API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use parley_core::config::GeneralResponderConfig;
use parley_core::types::{AttachmentPayload, Role};

use super::{
    build_client, document_text, first_text, network_error, prepare_turns, upstream_error,
    ReplyBlock, Responder, ResponderRequest,
};
use crate::error::ResponderError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const SERVICE: &str = "general";

/// Responder for general questions.
#[derive(Clone)]
pub struct AnthropicResponder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    system: String,
    max_tokens: u32,
}

impl AnthropicResponder {
    pub fn from_config(config: &GeneralResponderConfig) -> Self {
        Self {
            client: build_client(config.timeout_secs),
            endpoint: config.base_url.clone(),
            api_key: config.resolved_api_key(),
            model: config.model.clone(),
            system: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
        }
    }

    fn build_request(&self, request: &ResponderRequest<'_>) -> CreateMessageRequest {
        let (turns, prompt) = prepare_turns(request.history, request.prompt);

        let mut messages: Vec<WireMessage> = turns
            .into_iter()
            .map(|turn| WireMessage {
                role: turn.role.as_str(),
                content: vec![ContentBlock::Text { text: turn.text }],
            })
            .collect();

        let mut content = vec![ContentBlock::Text { text: prompt }];
        for attachment in request.attachments {
            match &attachment.payload {
                AttachmentPayload::Binary(_) => content.push(ContentBlock::Image {
                    source: ImageSource {
                        kind: "base64",
                        media_type: attachment.media_type.clone(),
                        data: attachment.to_base64(),
                    },
                }),
                AttachmentPayload::Text(_) => {
                    if let Some(text) = document_text(attachment) {
                        content.push(ContentBlock::Text { text });
                    }
                }
            }
        }
        messages.push(WireMessage {
            role: Role::User.as_str(),
            content,
        });

        CreateMessageRequest {
            model: self.model.clone(),
            system: Some(self.system.clone()).filter(|s| !s.trim().is_empty()),
            max_tokens: self.max_tokens,
            messages,
        }
    }
}

#[async_trait]
impl Responder for AnthropicResponder {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn respond(&self, request: &ResponderRequest<'_>) -> Result<String, ResponderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ResponderError::NotConfigured("no API key for the general responder".to_string())
        })?;

        let body = self.build_request(request);
        tracing::debug!(
            model = %body.model,
            turns = body.messages.len(),
            attachments = request.attachments.len(),
            "Sending general completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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

        let parsed: CreateMessageResponse = serde_json::from_str(&text)
            .map_err(|e| ResponderError::Parse(format!("invalid general response: {}", e)))?;
        first_text(parsed.content)
    }
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ReplyBlock>,
}
