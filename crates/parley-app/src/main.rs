//! Parley entry point: wires configuration, logging, responders and the
//! selected input surface.

mod cli;
mod repl;

use std::sync::Arc;

use clap::Parser;

use parley_api::AppState;
use parley_chat::{AnthropicResponder, ChatCompletionsResponder, ChatOrchestrator};
use parley_core::config::ParleyConfig;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing so the configured level applies; the
    // outcome is logged once the subscriber is up.
    let config_file = args.resolve_config_path();
    let loaded = if config_file.exists() {
        Some(ParleyConfig::load(&config_file))
    } else {
        None
    };
    let mut config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => ParleyConfig::default(),
    };

    // Tracing. Logs go to stderr so they do not interleave with the REPL transcript.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match loaded {
        Some(Ok(_)) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(Err(e)) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load configuration, using defaults"
        ),
        None => tracing::info!(
            path = %config_file.display(),
            "No configuration file, using defaults"
        ),
    }

    config.general.port = args.resolve_port(config.general.port);
    warn_missing_keys(&config);

    match args.command() {
        Command::Serve => {
            let state = AppState::from_config(config.clone());
            tracing::info!(
                "Chat page available at http://{}:{}/ui",
                config.general.bind_address,
                config.general.port
            );
            parley_api::start_server(&config, state).await?;
        }
        Command::Chat { thread } => {
            let general = Arc::new(AnthropicResponder::from_config(&config.general_responder));
            let current = Arc::new(ChatCompletionsResponder::from_config(
                &config.current_responder,
            ));
            let orchestrator = ChatOrchestrator::new(&config, general, current);
            let session = repl::Repl::new(orchestrator, thread.as_deref())?;
            repl::run(session).await?;
        }
    }

    Ok(())
}

fn warn_missing_keys(config: &ParleyConfig) {
    if config.general_responder.resolved_api_key().is_none() {
        tracing::warn!(
            env = %config.general_responder.api_key_env,
            "No API key for the general responder; general questions will fail"
        );
    }
    if config.current_responder.resolved_api_key().is_none() {
        tracing::warn!(
            env = %config.current_responder.api_key_env,
            "No API key for the current-information responder; news and weather questions will fail"
        );
    }
}
