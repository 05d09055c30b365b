#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

mod command;

use clap::{Parser, Subcommand};
use command::{
    ChatInput, ChatStrategy, CommandStrategy, InfoStrategy, InitStrategy, VersionStrategy,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "parley conversational assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the model, keeping history per session
    Chat {
        /// Single message to send (interactive when omitted)
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,

        /// Session to resume or create
        #[arg(short = 's', long)]
        session: Option<String>,

        /// Memory owner for this conversation
        #[arg(short = 'o', long)]
        owner: Option<String>,

        /// Print the reply as it is generated
        #[arg(long)]
        stream: bool,

        /// Do not offer built-in tools to the model
        #[arg(long)]
        no_tools: bool,

        /// Clear the session's history before starting
        #[arg(long)]
        reset: bool,
    },
    /// Initialize configuration
    Init,
    /// Show configuration
    Info,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            message,
            model,
            session,
            owner,
            stream,
            no_tools,
            reset,
        } => {
            ChatStrategy
                .execute(ChatInput {
                    message,
                    model,
                    session,
                    owner,
                    stream,
                    tools: !no_tools,
                    reset,
                })
                .await
        }
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
