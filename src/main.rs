//! # Manual QA CLI (`mqa`)
//!
//! The `mqa` binary is the primary interface for the manual question-answering
//! service. It provides commands for database initialization, manual
//! ingestion, catalog inspection, one-shot querying, and starting the HTTP
//! query server.
//!
//! ## Usage
//!
//! ```bash
//! mqa --config ./config/mqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mqa init` | Create the SQLite database and run schema migrations |
//! | `mqa ingest <path>` | Chunk, embed, and index extracted manual text |
//! | `mqa catalog` | List indexed manuals |
//! | `mqa ask "<query>"` | Answer one question from the command line |
//! | `mqa serve` | Start the HTTP query server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! mqa init --config ./config/mqa.toml
//!
//! # Ingest a directory of extracted manuals
//! mqa ingest ./manuals --config ./config/mqa.toml
//!
//! # Ask a question, streaming the answer as it is generated
//! mqa ask "밥캣 T590 엔진 오일 사양 알려줘" --stream --config ./config/mqa.toml
//!
//! # Start the query server
//! mqa serve --config ./config/mqa.toml
//! ```

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use manual_qa::{catalog, config, db, embedding, index, ingest, migrate, pipeline, server};

/// Manual QA CLI — a retrieval-augmented question-answering service for
/// technical equipment manuals.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/mqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mqa",
    about = "Manual QA — retrieval-augmented question answering over technical equipment manuals",
    version,
    long_about = "Manual QA ingests extracted manual text (chunking on Markdown headings, \
    attributing page numbers, embedding into a SQLite vector index) and answers natural-language \
    questions against it: queries are classified, scoped to one manual, grounded in retrieved \
    chunks, and answered with page-level source citations via a CLI and HTTP server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/mqa.toml`. Database, chunking, retrieval,
    /// embedding, completion, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/mqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the chunk and vector tables.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest extracted manual text.
    ///
    /// Chunks each `.md`/`.txt` file on Markdown headings, attributes a
    /// page number to every chunk, embeds the chunks, and stores them in
    /// the vector index. Re-ingesting a manual replaces its previous
    /// chunks wholesale. The manual name is the file stem.
    Ingest {
        /// A file, or a directory walked recursively.
        path: PathBuf,
    },

    /// List indexed manuals.
    Catalog,

    /// Answer one question from the command line.
    ///
    /// Runs the full query pipeline: classification, retrieval scoped to
    /// the named manual, and grounded answer generation with page-level
    /// citations. Greetings and off-topic questions get fixed answers
    /// without touching the index.
    Ask {
        /// The question, in natural language.
        query: String,

        /// Print answer fragments as they are generated instead of
        /// waiting for the full answer.
        #[arg(long)]
        stream: bool,
    },

    /// Start the HTTP query server.
    ///
    /// Binds to the address configured in `[server].bind` and exposes
    /// `POST /query`, `POST /query/stream` (SSE), and `GET /health`.
    Serve,
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
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path } => {
            let embedder = embedding::HttpEmbedder::new(&cfg.embedding)?;
            let pool = db::connect(&cfg.db).await?;
            let index = index::SqliteIndex::new(pool);
            ingest::run_ingest(&path, &embedder, &index, cfg.chunking.max_chars).await?;
            index.close().await;
        }
        Commands::Catalog => {
            let pool = db::connect(&cfg.db).await?;
            let index = index::SqliteIndex::new(pool);
            let catalog = catalog::ManualCatalog::load(&index).await?;
            if catalog.is_empty() {
                println!("No manuals indexed. Run `mqa ingest <path>` first.");
            } else {
                println!("Indexed manuals:");
                for name in catalog.manuals() {
                    println!("  {}", name);
                }
            }
            index.close().await;
        }
        Commands::Ask { query, stream } => {
            let pipeline = pipeline::QueryPipeline::from_config(&cfg).await?;
            if stream {
                let mut rx = pipeline.run_stream(&query).await?;
                let mut stdout = std::io::stdout();
                while let Some(fragment) = rx.recv().await {
                    write!(stdout, "{}", fragment?)?;
                    stdout.flush()?;
                }
                writeln!(stdout)?;
            } else {
                let outcome = pipeline.run(&query).await?;
                println!("{}", outcome.text());
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
