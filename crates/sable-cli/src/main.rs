use anyhow::Result;
use clap::{Parser, Subcommand};
use sable_core::config::load_config;
use sable_core::session::ConversationStore;
use sable_interaction::InteractionManager;
use std::path::PathBuf;
use std::sync::Arc;

mod commands;

#[derive(Parser)]
#[command(name = "sable")]
#[command(about = "SABLE - Session-Aware Bridge for LLM Executables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt through the resilience layer
    Ask {
        /// The prompt text
        prompt: String,
        /// Project directory the conversation is about
        #[arg(long, default_value = ".")]
        project: PathBuf,
        /// Extra context prepended to the prompt
        #[arg(long)]
        context: Option<String>,
        /// Skip session state and run a single one-shot invocation
        #[arg(long)]
        one_shot: bool,
    },
    /// Classify a request into an intent category
    Classify {
        /// The request text to classify
        text: String,
    },
    /// Check external tool availability and show the active configuration
    Doctor,
    /// Session housekeeping
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Evict sessions idle longer than the given age
    Evict {
        #[arg(long, default_value_t = 24)]
        max_age_hours: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config()?;
    let store = Arc::new(ConversationStore::new(config.limits));
    let manager = InteractionManager::new(&config, store);

    match cli.command {
        Commands::Ask {
            prompt,
            project,
            context,
            one_shot,
        } => commands::ask::run(&manager, &prompt, &project, context.as_deref(), one_shot).await?,
        Commands::Classify { text } => commands::classify::run(&manager, &text).await?,
        Commands::Doctor => commands::doctor::run(&manager, &config).await?,
        Commands::Session { action } => match action {
            SessionAction::Evict { max_age_hours } => {
                commands::session::evict(&manager, max_age_hours).await?
            }
        },
    }

    manager.shutdown().await;
    Ok(())
}
