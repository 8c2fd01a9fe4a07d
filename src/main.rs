//! # RAG Harness CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag init` | Create the SQLite database and schema |
//! | `rag ingest <paths...>` | Chunk, embed and index files or directories |
//! | `rag retrieve "<question>"` | Print the top-k contexts as JSON |
//! | `rag ask "<question>"` | Retrieve, build the prompt, and generate an answer |
//! | `rag serve` | Start the HTTP server |
//!
//! Logs go to stderr and are controlled by `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rag_harness::{ask, config, ingest, migrate, progress::ProgressMode, retrieve, server};

/// RAG Harness: retrieval-augmented question answering over your documents.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "RAG Harness: retrieval-augmented question answering over your documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it again never drops indexed vectors.
    Init,

    /// Ingest files or directories into the index.
    ///
    /// Documents are processed in order; a failing document does not stop
    /// the rest of the batch. Names already recorded in the ingest ledger
    /// are skipped; with `[ingest] persist_ledger = false` that record does
    /// not outlive this command.
    Ingest {
        /// Files or directories (walked recursively).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Progress output on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` when stderr is a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Retrieve the most similar contexts for a question.
    Retrieve {
        question: String,

        /// Number of contexts (defaults to `[retrieval] top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a question using retrieved contexts and the generation service.
    Ask { question: String },

    /// Start the HTTP server on `[server] bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths, progress } => {
            let mode = match progress.as_deref() {
                None => ProgressMode::default_for_tty(),
                Some(value) => ProgressMode::parse(value).ok_or_else(|| {
                    anyhow::anyhow!("Invalid --progress '{}'. Must be off, human, or json.", value)
                })?,
            };
            ingest::run_ingest(&cfg, &paths, mode).await?;
        }
        Commands::Retrieve { question, k } => {
            if k == Some(0) {
                anyhow::bail!("--k must be >= 1");
            }
            retrieve::run_retrieve(&cfg, &question, k).await?;
        }
        Commands::Ask { question } => {
            ask::run_ask(&cfg, &question).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
