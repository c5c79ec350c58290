use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub mod chat;
pub mod commit;
pub mod history;

use crate::core::AppConfig;
use crate::core::vcs::Vcs;

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session
    Chat {
        /// Resume a stored chat by title instead of starting fresh
        #[arg(long)]
        load: Option<String>,

        /// Override the configured model for this session
        #[arg(long)]
        model: Option<String>,
    },
    /// List stored chats, newest first
    History {},
    /// Generate a commit message from the staged diff
    CommitMessage {
        /// Read the diff from jj instead of git
        #[arg(long, action, default_value = "false")]
        jj: bool,

        /// Replace the built-in commit message instructions
        #[arg(long)]
        prompt: Option<String>,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "futago=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Chat { load, model }) => {
            chat::run(&config, load.as_deref(), model.as_deref()).await?;
        }
        Some(Command::History {}) => {
            history::run(&config).await?;
        }
        Some(Command::CommitMessage { jj, prompt }) => {
            let vcs = if jj { Vcs::Jj } else { Vcs::Git };
            commit::run(&config, vcs, prompt.as_deref()).await?;
        }
        None => {}
    }

    Ok(())
}
