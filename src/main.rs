//! Chatdeck - terminal chat client
//!
#![doc = "Chatdeck - terminal chat client"]
#![doc = "Main entry point for the chatdeck application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatdeck::cli::{Cli, Commands};
use chatdeck::commands;
use chatdeck::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Chat {
            conversation,
            model,
            deep_think,
            online_search,
            prompt,
        } => {
            tracing::info!("Starting chat");
            if let Some(c) = &conversation {
                tracing::debug!("Continuing conversation: {}", c);
            }
            if let Some(m) = &model {
                tracing::debug!("Using model override: {}", m);
            }
            commands::chat::run_chat(config, conversation, model, deep_think, online_search, prompt)
                .await?;
            Ok(())
        }
        Commands::Login { username, password } => {
            commands::auth::handle_login(&config, &username, &password).await?;
            Ok(())
        }
        Commands::Register {
            username,
            password,
            email,
        } => {
            commands::auth::handle_register(&config, &username, &password, email.as_deref().unwrap_or(""))
                .await?;
            Ok(())
        }
        Commands::Logout => {
            commands::auth::handle_logout(&config).await?;
            Ok(())
        }
        Commands::Conversations { command } => {
            commands::conversations::handle_conversations(&config, command).await?;
            Ok(())
        }
        Commands::Messages { conversation_id } => {
            commands::conversations::handle_messages(&config, &conversation_id).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins; otherwise `--verbose` selects debug output for this
/// crate.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "chatdeck=debug" } else { "chatdeck=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
