//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use parley_chat::{AnthropicResponder, ChatCompletionsResponder, ChatOrchestrator};
use parley_core::config::ParleyConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. The
/// orchestrator guards its own session map.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, read-only after startup.
    pub config: Arc<ParleyConfig>,
    /// Session registry and turn pipeline.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ParleyConfig, orchestrator: ChatOrchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            start_time: Instant::now(),
        }
    }

    /// Build the state with the HTTP-backed responders described by `config`.
    pub fn from_config(config: ParleyConfig) -> Self {
        let general = Arc::new(AnthropicResponder::from_config(&config.general_responder));
        let current = Arc::new(ChatCompletionsResponder::from_config(
            &config.current_responder,
        ));
        let orchestrator = ChatOrchestrator::new(&config, general, current);
        Self::new(config, orchestrator)
    }
}
