//! # tablefinder CLI (`tf`)
//!
//! Builds schema snapshots, answers table-retrieval queries, and serves the
//! HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! tf --config ./config/tf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tf build` | Full rebuild: describe and embed every active table |
//! | `tf refresh [--full]` | Stats-only refresh (or full with `--full`) |
//! | `tf search "<query>"` | Rank the tables relevant to a question |
//! | `tf info` | Summary of the persisted snapshot |
//! | `tf context <TABLE>...` | Schema context text for named tables |
//! | `tf serve` | Start the HTTP API with the background refresher |
//!
//! Log verbosity is controlled by `TF_LOG` (e.g. `TF_LOG=debug`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tablefinder::{commands, config, server};

/// tablefinder: natural-language schema retrieval.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tf.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tf",
    about = "tablefinder: find the database tables relevant to a natural-language question",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the snapshot from the catalog, re-embedding every active table.
    Build,

    /// Refresh row counts and active flags without re-embedding.
    Refresh {
        /// Run a full rebuild instead.
        #[arg(long)]
        full: bool,
    },

    /// Rank the tables relevant to a query.
    Search {
        /// Natural-language question.
        query: String,

        /// Maximum number of tables to return.
        #[arg(long, default_value = "8")]
        limit: usize,

        /// Do not add related tables through foreign keys.
        #[arg(long)]
        no_expand: bool,

        /// Show the semantic, importance and keyword components.
        #[arg(long)]
        explain: bool,
    },

    /// Show a summary of the current snapshot.
    Info,

    /// Print schema context for the named tables.
    Context {
        /// Table names.
        #[arg(required = true)]
        tables: Vec<String>,
    },

    /// Serve the HTTP API.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TF_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;
    let retriever = commands::open_retriever(&cfg).await?;

    match cli.command {
        Commands::Build => commands::run_build(&retriever).await?,
        Commands::Refresh { full } => commands::run_refresh(&retriever, full).await?,
        Commands::Search {
            query,
            limit,
            no_expand,
            explain,
        } => commands::run_search(&retriever, &query, limit, !no_expand, explain).await?,
        Commands::Info => commands::run_info(&retriever)?,
        Commands::Context { tables } => commands::run_context(&retriever, &tables).await?,
        Commands::Serve => server::run_server(&cfg, retriever).await?,
    }

    Ok(())
}
