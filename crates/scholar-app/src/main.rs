//! Scholar application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Build the answering service (blocking error screen if unconfigured)
//! 3. Sign in through the identity provider
//! 4. Load the knowledge document and start a chat session
//! 5. Run the terminal chat until the user quits, then sign out

mod cli;
mod identity;
mod terminal;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use scholar_chat::{AnsweringService, ChatController, GeminiClient};
use scholar_core::types::KnowledgeContext;

use crate::cli::CliArgs;
use crate::identity::provider_from_config;

/// RUST_LOG wins; otherwise the configured level. Logs go to stderr so they
/// never interleave with the chat transcript on stdout.
fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let mut stdout = std::io::stdout();

    // Config. Loaded before tracing so the configured level applies.
    let config_file = args.resolve_config_path();
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(args.log_level.as_deref().unwrap_or("info"));
            tracing::error!(path = %config_file.display(), error = %e, "Failed to load config");
            terminal::render_blocking_error(
                &mut stdout,
                "Configuration Error",
                &format!("{}\n\nFix or remove {}.", e, config_file.display()),
            )?;
            return Ok(ExitCode::FAILURE);
        }
    };
    init_tracing(&config.general.log_level);

    tracing::info!("Starting Scholar v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), exists = config_file.exists(), "Configuration resolved");

    // Answering service.
    let service: Arc<dyn AnsweringService> = match GeminiClient::from_config(&config.answering) {
        Ok(client) => {
            tracing::info!(model = client.model(), "Answering service ready");
            Arc::new(client)
        }
        Err(e) => {
            tracing::error!(error = %e, "Answering service unavailable");
            terminal::render_blocking_error(
                &mut stdout,
                "Configuration Error",
                &format!(
                    "{}\n\nSet [answering].api_key in {} or export {}.",
                    e,
                    config_file.display(),
                    config.answering.api_key_env
                ),
            )?;
            return Ok(ExitCode::FAILURE);
        }
    };

    // Sign in.
    let provider = match provider_from_config(&config.identity) {
        Ok(p) => p,
        Err(e) => {
            terminal::render_blocking_error(&mut stdout, "Sign-in Error", &e.to_string())?;
            return Ok(ExitCode::FAILURE);
        }
    };
    let token = args.resolve_id_token().unwrap_or_default();
    let identity = match provider.exchange_credential(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            terminal::render_blocking_error(&mut stdout, "Sign-in failed", &e.to_string())?;
            return Ok(ExitCode::FAILURE);
        }
    };
    tracing::debug!(id = %identity.id, picture = ?identity.picture, "Signed in");

    // Knowledge.
    let context = match KnowledgeContext::load(&config.knowledge) {
        Ok(context) => context,
        Err(e) => {
            terminal::render_blocking_error(&mut stdout, "Knowledge Error", &e.to_string())?;
            return Ok(ExitCode::FAILURE);
        }
    };
    let source_label = context.source_label.clone();

    // Session.
    let timeout = Duration::from_secs(config.answering.request_timeout_secs.max(1));
    let mut controller = ChatController::new(timeout);
    controller.initialize(context);

    {
        use std::io::Write;
        writeln!(stdout, "Welcome, {}!", identity.display_name())?;
        writeln!(stdout, "Answering from {}\n", source_label)?;
    }

    let lines = terminal::spawn_stdin_reader();
    terminal::run(&mut controller, service, lines, &mut stdout).await?;

    controller.end();
    tracing::info!("Signed out");
    Ok(ExitCode::SUCCESS)
}
