//! # opspulse CLI
//!
//! The `opspulse` binary drives the ingestion pipeline and answers
//! questions from the terminal.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `opspulse init` | Bootstrap the vector schema (extension, table, index) |
//! | `opspulse etl` | Run the trailing-window ingestion pass |
//! | `opspulse ask "<question>"` | Retrieve ranked answers |
//! | `opspulse serve` | Start the HTTP surface |
//! | `opspulse sources` | Show source/backend health and settings |
//!
//! All commands accept `--config` pointing to a TOML file; see
//! `config/opspulse.example.toml`. Recurring ingestion is scheduled
//! externally (cron invoking `opspulse etl`); the `[scheduler]` config
//! block records the intended cadence.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use opspulse::config;
use opspulse::db;
use opspulse::embedding::Embedder;
use opspulse::etl;
use opspulse::retrieve::Retriever;
use opspulse::server;
use opspulse::sources;
use opspulse::store;

/// opspulse — telemetry ingestion and retrieval.
#[derive(Parser)]
#[command(
    name = "opspulse",
    about = "Telemetry ingestion and retrieval: vector search over operational history with keyword fallback",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/opspulse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the vector schema.
    ///
    /// Creates the vector extension, the documents table, and the cosine
    /// similarity index sized to the configured dimension. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Run the ETL window pass.
    ///
    /// Walks the trailing N-day window most-recent-first, collects every
    /// enabled source per date, embeds, and writes documents. Exits
    /// non-zero only on unrecoverable setup failure; empty or failed
    /// individual dates are reported and skipped.
    Etl,

    /// Ask a question and print ranked answers.
    Ask {
        /// The question text.
        question: String,

        /// Number of answers to return (clamped to 1..=50).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Start the HTTP server (`/qa`, `/llm/chat`, `/health`).
    Serve,

    /// Show configured sources and backend settings.
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.vector).await?;
            store::ensure_schema(&pool, cfg.vector.dim).await?;
            pool.close().await;
            println!("Schema initialized successfully.");
        }
        Commands::Etl => {
            let embedder = Arc::new(Embedder::new(cfg.embedding.clone()));
            etl::run_etl(&cfg, embedder).await?;
        }
        Commands::Ask { question, top_k } => {
            let embedder = Arc::new(Embedder::new(cfg.embedding.clone()));
            let retriever = Retriever::new(Arc::new(cfg), embedder);
            let response = retriever.retrieve(&question, top_k).await;

            if response.answers.is_empty() {
                println!("No results.");
            } else {
                for (i, answer) in response.answers.iter().enumerate() {
                    println!("{}. [{:.3}] {}", i + 1, answer.score, answer.source);
                    println!("   {}", answer.content);
                }
            }
        }
        Commands::Serve => {
            let embedder = Arc::new(Embedder::new(cfg.embedding.clone()));
            server::run_server(&cfg, embedder).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
    }

    Ok(())
}
