//! # ragchat CLI
//!
//! The `ragchat` binary drives document ingestion and retrieval-augmented
//! chat from the command line.
//!
//! ## Usage
//!
//! ```bash
//! ragchat --config ./config/ragchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragchat init` | Create the SQLite database and tables |
//! | `ragchat load <path>` | Print the chunks a file splits into (no writes) |
//! | `ragchat ingest <path>` | Index a file into the vector store |
//! | `ragchat ingest-text "<text>"` | Index free text |
//! | `ragchat upload <path>` | Copy, index and record an uploaded file |
//! | `ragchat retrieve "<query>"` | Show the top matching chunks |
//! | `ragchat ask <chat-id> "<query>"` | Answer a query within a chat |
//! | `ragchat new "<query>"` | Start a new chat |
//! | `ragchat chats` | List chats |
//! | `ragchat history <chat-id>` | Show a chat's exchanges |
//! | `ragchat documents` | List uploaded documents |
//! | `ragchat document <id>` | Show one uploaded document |
//!
//! Logging goes to stderr through `tracing`; set `RUST_LOG` to override
//! the default `ragchat=info` filter.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ragchat::commands;
use ragchat::config;
use ragchat::index::IndexOptions;
use ragchat::progress::ProgressMode;

/// ragchat: ingest documents and chat with them.
#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "Retrieval-augmented chat over your own documents",
    version,
    long_about = "ragchat splits documents into chunks, indexes them into a vector store, \
    and answers chat queries with retrieved context and conversation history."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the vectors, chats and
    /// documents tables. Running it multiple times is safe.
    Init,

    /// Load and split a file, printing the chunks without indexing them.
    Load {
        path: PathBuf,
    },

    /// Index a file into the vector store.
    ///
    /// `.json` / `.jsonl` files are read as table-style records; any other
    /// file goes through the format loader selected by its extension.
    Ingest {
        path: PathBuf,

        /// Chunks per vector-store write (overrides `[index].batch_size`).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Secondary split window (overrides `[index].chunk_size`).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Secondary split overlap (overrides `[index].chunk_overlap`).
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Progress output: `auto`, `human`, `json` or `off`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Index free text into the vector store.
    IngestText {
        text: String,
    },

    /// Copy a file into the upload directory, index it and record it.
    Upload {
        path: PathBuf,
    },

    /// Show the chunks most similar to a query.
    Retrieve {
        query: String,

        /// Number of results (overrides `[retrieval].k`).
        #[arg(long)]
        k: Option<i64>,
    },

    /// Answer a query within an existing (or new) chat.
    Ask {
        chat_id: i64,
        query: String,

        /// Use the running conversation summary instead of full history.
        #[arg(long)]
        summarize: bool,

        /// Log every message sent to the model.
        #[arg(long)]
        debug: bool,
    },

    /// Start a new chat with a first query.
    New {
        query: String,
    },

    /// List chats.
    Chats,

    /// Show a chat's full history.
    History {
        chat_id: i64,
    },

    /// List uploaded documents.
    Documents,

    /// Show one uploaded document by id.
    Document {
        id: String,
    },
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ragchat=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_progress(mode: &str) -> anyhow::Result<ProgressMode> {
    match mode {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        "off" => Ok(ProgressMode::Off),
        other => anyhow::bail!(
            "Unknown progress mode: '{}'. Must be auto, human, json, or off.",
            other
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
        Commands::Load { path } => {
            commands::run_load(&cfg, &path)?;
        }
        Commands::Ingest {
            path,
            batch_size,
            chunk_size,
            chunk_overlap,
            progress,
        } => {
            let defaults = IndexOptions::from(&cfg.index);
            let options = IndexOptions {
                batch_size: batch_size.unwrap_or(defaults.batch_size),
                chunk_size: chunk_size.unwrap_or(defaults.chunk_size),
                chunk_overlap: chunk_overlap.unwrap_or(defaults.chunk_overlap),
            };
            commands::run_ingest(&cfg, &path, options, parse_progress(&progress)?).await?;
        }
        Commands::IngestText { text } => {
            commands::run_ingest_text(&cfg, &text).await?;
        }
        Commands::Upload { path } => {
            commands::run_upload(&cfg, &path).await?;
        }
        Commands::Retrieve { query, k } => {
            commands::run_retrieve(&cfg, &query, k).await?;
        }
        Commands::Ask {
            chat_id,
            query,
            summarize,
            debug,
        } => {
            commands::run_ask(&cfg, chat_id, &query, summarize, debug).await?;
        }
        Commands::New { query } => {
            commands::run_new(&cfg, &query).await?;
        }
        Commands::Chats => {
            commands::run_chats(&cfg).await?;
        }
        Commands::History { chat_id } => {
            commands::run_history(&cfg, chat_id).await?;
        }
        Commands::Documents => {
            commands::run_documents(&cfg).await?;
        }
        Commands::Document { id } => {
            commands::run_document(&cfg, &id).await?;
        }
    }

    Ok(())
}
