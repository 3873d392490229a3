use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use quarry_core::ingest::ingest_directory;
use quarry_core::tokenizer::tokenize;
use quarry_core::{open_index, MemoryIndex, SqliteIndex, UnsupportedIndexExtension};

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Index a directory of documents and answer ranked TF-IDF queries", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a directory into a new or existing index
    Build {
        /// Directory to ingest
        #[arg(long)]
        dir: PathBuf,
        /// Index file to produce: .db for SQLite, .json for in-memory
        #[arg(long)]
        db: PathBuf,
    },
    /// Run a ranked query against an index
    Query {
        /// Index file to query
        #[arg(long)]
        db: PathBuf,
        /// Query text
        #[arg(long)]
        query: String,
        /// Number of results to print
        #[arg(long = "topN", default_value_t = 10)]
        top_n: usize,
    },
    /// Serve the search UI and JSON API
    Serve {
        /// Index file to serve
        #[arg(long)]
        db: PathBuf,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:6969")]
        addr: String,
    },
    /// Print usage and exit with a failure status
    Help,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Build { dir, db } => build(&dir, &db),
        Commands::Query { db, query, top_n } => run_query(&db, &query, top_n),
        Commands::Serve { db, addr } => serve(&db, &addr).await,
        Commands::Help => {
            Cli::command()
                .print_long_help()
                .context("cannot print usage")?;
            std::process::exit(2);
        }
    };
    if let Err(err) = &result {
        // An unknown index extension is a configuration failure: print
        // usage, like the missing-flag and unknown-subcommand paths, and
        // let the error exit non-zero.
        if err.downcast_ref::<UnsupportedIndexExtension>().is_some() {
            Cli::command()
                .print_long_help()
                .context("cannot print usage")?;
        }
    }
    result
}

/// The target extension picks the backend; the in-memory index is dumped
/// to its JSON store once ingestion finishes. Building against an existing
/// index file of either kind updates it in place: documents from earlier
/// runs survive unless this run re-ingests them.
fn build(dir: &Path, db: &Path) -> Result<()> {
    match db.extension().and_then(|ext| ext.to_str()) {
        Some("db") => {
            let mut index = SqliteIndex::new(db);
            let count = ingest_directory(&mut index, dir)?;
            index.close()?;
            tracing::info!(documents = count, db = %db.display(), "sqlite index built");
        }
        Some("json") => {
            let mut index = if db.is_file() {
                MemoryIndex::load(db)?
            } else {
                MemoryIndex::new()
            };
            let count = ingest_directory(&mut index, dir)?;
            index.dump(db)?;
            tracing::info!(documents = count, db = %db.display(), "json index built");
        }
        _ => return Err(UnsupportedIndexExtension::new(db).into()),
    }
    Ok(())
}

fn run_query(db: &Path, query: &str, top_n: usize) -> Result<()> {
    let mut index = open_index(db)?;
    let tokens = tokenize(query);
    let results = index.query_top_n(&tokens, top_n)?;
    if results.is_empty() {
        println!("no results");
        return Ok(());
    }
    for result in results {
        println!("{:>10.4}  {}", result.score, result.doc_id);
    }
    Ok(())
}

async fn serve(db: &Path, addr: &str) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid listen address `{addr}`"))?;
    quarry_server::serve(db, addr).await
}
