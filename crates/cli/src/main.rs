//! Folio CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  Write a default config file
//! - `gateway`  Start the HTTP API server
//! - `ask`      Ask one question about a document and show what the viewer would do
//! - `actions`  Split a raw answer (stdin) into prose and directives
//! - `doctor`   Diagnose configuration and storage

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio: chat with a PDF and let the answer point at the page",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask one question about a document
    Ask {
        /// The question
        question: String,

        /// ID of a document already in the configured store
        #[arg(short, long, conflicts_with = "text_file", required_unless_present = "text_file")]
        document: Option<String>,

        /// Plain-text file with one page per form feed, used instead of the store
        #[arg(short, long)]
        text_file: Option<PathBuf>,

        /// Record the turn in this chat session
        #[arg(short, long, requires = "document")]
        session: Option<String>,
    },

    /// Read a raw answer on stdin and print its prose and directives
    Actions {
        /// Print only the text that would be spoken aloud
        #[arg(long)]
        speakable: bool,
    },

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Ask {
            question,
            document,
            text_file,
            session,
        } => {
            let source = match (document, text_file) {
                (_, Some(path)) => commands::ask::Source::TextFile(path),
                (Some(id), None) => commands::ask::Source::Stored { id, session },
                (None, None) => return Err("either --document or --text-file is required".into()),
            };
            commands::ask::run(source, &question).await?
        }
        Commands::Actions { speakable } => commands::actions::run(speakable)?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
