//! # Portfolio Chat CLI (`folio`)
//!
//! Builds the profile index and answers questions about it, from the
//! terminal or over HTTP.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio clean <file>` | Strip markdown bold and separator lines from a corpus file |
//! | `folio index build` | Chunk, embed and persist the cleaned corpus |
//! | `folio index info` | Show index metadata |
//! | `folio search "<query>"` | Print the nearest chunks |
//! | `folio ask "<question>"` | One-shot answer |
//! | `folio chat` | Interactive terminal chat |
//! | `folio serve` | Start the HTTP chat server |
//! | `folio models pull` | Download the embedding and language models |
//!
//! Environment variables (`CHAT_MODE`, `PORT`, `LOCAL_LLM_MODEL`, ...) are
//! read from the process and from a `.env` file in the working directory.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use portfolio_chat::{chat, config, download, index, preprocess, retrieve, server};

/// Portfolio Chat: ask questions about a professional profile.
#[derive(Parser)]
#[command(
    name = "folio",
    about = "Portfolio Chat: a retrieval-augmented chatbot over a personal profile",
    version
)]
struct Cli {
    /// Path to an optional configuration file (TOML).
    ///
    /// Without it, built-in defaults plus environment overrides are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a raw corpus file.
    ///
    /// Removes `**` bold markers and lines made only of `-`/`=` characters.
    /// The input file is left untouched.
    Clean {
        /// Raw corpus text file.
        input: PathBuf,

        /// Output path. Defaults to `<stem>_cleaned.txt` beside the input.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Build or inspect the vector index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Print the chunks nearest to a query.
    Search {
        query: String,

        /// Number of chunks to return (default: `retrieval.top_k`).
        #[arg(short)]
        k: Option<usize>,
    },

    /// Answer a single question.
    Ask {
        question: String,

        /// Number of chunks to retrieve (default: `retrieval.top_k`).
        #[arg(short)]
        k: Option<usize>,
    },

    /// Interactive chat in the terminal.
    Chat,

    /// Start the HTTP chat server.
    ///
    /// Serves `POST /chat`, `POST /api/chat`, `POST /api/suggest` and
    /// `GET /health` on `server.host:PORT`.
    Serve,

    /// Manage model downloads.
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Chunk and embed the cleaned corpus, replacing any existing index.
    Build {
        /// Cleaned corpus file.
        #[arg(long, default_value = "profile_cleaned.txt")]
        input: PathBuf,
    },
    /// Show metadata for the current index.
    Info,
}

#[derive(Subcommand)]
enum ModelsAction {
    /// Download the embedding model and pull the local language model.
    Pull {
        /// Only fetch the embedding model.
        #[arg(long)]
        skip_llm: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Cleaning needs no configuration.
    if let Commands::Clean { input, output } = &cli.command {
        preprocess::run_clean(input, output.as_deref())?;
        return Ok(());
    }

    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Clean { .. } => unreachable!(),
        Commands::Index { action } => match action {
            IndexAction::Build { input } => {
                index::run_index_build(&cfg, &input).await?;
            }
            IndexAction::Info => {
                index::run_index_info(&cfg)?;
            }
        },
        Commands::Search { query, k } => {
            retrieve::run_search(&cfg, &query, k).await?;
        }
        Commands::Ask { question, k } => {
            chat::run_ask(&cfg, &question, k).await?;
        }
        Commands::Chat => {
            chat::run_chat(&cfg).await?;
        }
        Commands::Serve => {
            let ctx = chat::ChatContext::load(&cfg).await?;
            server::run_server(&cfg.server, Arc::new(ctx)).await?;
        }
        Commands::Models { action } => match action {
            ModelsAction::Pull { skip_llm } => {
                download::pull_models(&cfg, skip_llm).await?;
            }
        },
    }

    Ok(())
}
