use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParleyError, Result};

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml` by default. Every section falls back
/// to its defaults when omitted, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub general_responder: GeneralResponderConfig,
    #[serde(default)]
    pub current_responder: CurrentResponderConfig,
    #[serde(default)]
    pub attachments: AttachmentConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ParleyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Server and process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// HTTP server port.
    pub port: u16,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Largest accepted request body. Uploads travel base64-encoded inside it.
    pub max_body_bytes: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3040,
            log_level: "info".to_string(),
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of most recent messages forwarded to a responder with each prompt.
    pub history_window: usize,
    /// Maximum prompt length in characters.
    pub max_message_length: usize,
    /// Idle minutes after which a session is discarded.
    pub session_timeout_minutes: u32,
    /// Name of the thread every new session starts with.
    pub default_thread: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: 5,
            max_message_length: 8000,
            session_timeout_minutes: 120,
            default_thread: "main".to_string(),
        }
    }
}

/// Keyword routing between the two responders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Ordered, case-insensitive phrases that send a prompt to the
    /// current-information responder.
    pub trigger_phrases: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            trigger_phrases: [
                "latest news",
                "news",
                "current events",
                "weather",
                "headlines",
                "today's",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Messages-API service used for general questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralResponderConfig {
    /// Full endpoint URL.
    pub base_url: String,
    pub model: String,
    /// Inline API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    /// Request timeout. No timeout when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for GeneralResponderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: None,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            system_prompt: "You are a helpful assistant. Answer clearly and concisely.".to_string(),
            max_tokens: 1024,
            timeout_secs: Some(60),
        }
    }
}

impl GeneralResponderConfig {
    /// API key from the config file, else from the configured environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), &self.api_key_env)
    }
}

/// Chat-completions service used for news, weather and other recent information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentResponderConfig {
    /// Full endpoint URL.
    pub base_url: String,
    pub model: String,
    /// Inline API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Request timeout. No timeout when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for CurrentResponderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.perplexity.ai/chat/completions".to_string(),
            model: "sonar".to_string(),
            api_key: None,
            api_key_env: "PERPLEXITY_API_KEY".to_string(),
            system_prompt: "You provide up-to-date information. Prefer the most recent \
                            sources, state dates explicitly and cite where the information \
                            comes from so it can be verified."
                .to_string(),
            temperature: 0.2,
            max_tokens: 1024,
            timeout_secs: Some(60),
        }
    }
}

impl CurrentResponderConfig {
    /// API key from the config file, else from the configured environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), &self.api_key_env)
    }
}

/// Upload acceptance rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    /// Largest accepted file, in bytes.
    pub max_bytes: usize,
    /// Lower-case extensions treated as images.
    pub image_extensions: Vec<String>,
    /// Lower-case extensions treated as text-bearing documents.
    pub document_extensions: Vec<String>,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_bytes: 200 * 1024 * 1024,
            image_extensions: ["png", "jpg", "jpeg"].into_iter().map(String::from).collect(),
            document_extensions: ["txt", "pdf", "doc", "docx", "csv"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

fn resolve_key(inline: Option<&str>, env_var: &str) -> Option<String> {
    if let Some(key) = inline.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    if env_var.is_empty() {
        return None;
    }
    std::env::var(env_var)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}
