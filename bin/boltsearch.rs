use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use boltsearch::{read_documents, IndexSettings, SearchEngine};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;

#[derive(Parser)]
#[command(name = "boltsearch")]
#[command(about = "Barrel-sharded keyword search over question/answer documents", long_about = None)]
struct Args {
    /// Settings file (JSON); flags below override it
    #[arg(long, env = "BOLT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding DocumentBarrels/ and barrels/
    #[arg(long, env = "BOLT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Id range width of every barrel
    #[arg(long, env = "BOLT_BARREL_WIDTH")]
    barrel_width: Option<u64>,

    /// Threads used by `index`
    #[arg(long, env = "BOLT_INGEST_WORKERS")]
    workers: Option<usize>,

    /// Lowercase only instead of stemming
    #[arg(long, env = "BOLT_NO_STEM")]
    no_stem: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest documents from a JSON array or JSON-lines file
    Index { file: PathBuf },
    /// Search the index; every word of the query is a term
    Search {
        query: String,
        #[arg(long, short)]
        limit: Option<usize>,
        /// Treat the query as one term
        #[arg(long)]
        term: bool,
    },
    /// Print a stored document
    Get { id: u64 },
    /// List posting barrel ranges
    Ranges,
    /// Check barrel range integrity
    Verify,
}

#[derive(Serialize)]
struct IndexSummary {
    indexed: usize,
    skipped: usize,
    incomplete: usize,
    failed: Vec<serde_json::Value>,
}

fn settings(args: &Args) -> Result<IndexSettings> {
    let mut settings = match &args.config {
        Some(path) => IndexSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => IndexSettings::default(),
    };
    if let Some(dir) = &args.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(width) = args.barrel_width {
        settings.barrel_width = width;
    }
    if let Some(workers) = args.workers {
        settings.ingest_workers = workers;
    }
    if args.no_stem {
        settings.tokenizer.stem = false;
    }
    Ok(settings)
}

fn run(args: Args) -> Result<serde_json::Value> {
    let engine = SearchEngine::open(settings(&args)?)?;

    let output = match args.command {
        Command::Index { file } => {
            let docs = read_documents(&file)
                .with_context(|| format!("reading documents from {}", file.display()))?;
            let mut summary = IndexSummary {
                indexed: 0,
                skipped: 0,
                incomplete: 0,
                failed: Vec::new(),
            };
            for (doc, result) in docs.iter().zip(engine.ingest_batch(&docs)) {
                match result {
                    Ok(r) if r.is_skipped() => summary.skipped += 1,
                    Ok(r) => {
                        summary.indexed += 1;
                        if !r.is_complete() {
                            summary.incomplete += 1;
                        }
                    }
                    Err(e) if e.is_integrity_error() => return Err(e.into()),
                    Err(e) => summary
                        .failed
                        .push(json!({ "id": doc.id, "error": e.to_string() })),
                }
            }
            info!(
                indexed = summary.indexed,
                skipped = summary.skipped,
                failed = summary.failed.len(),
                "index finished"
            );
            serde_json::to_value(summary)?
        }
        Command::Search { query, limit, term } => {
            let response = if term {
                engine.search_term(&query, limit)?
            } else {
                engine.search(&query, limit)?
            };
            serde_json::to_value(response)?
        }
        Command::Get { id } => match engine.get_document(id)? {
            Some(doc) => serde_json::to_value(doc)?,
            None => anyhow::bail!("document {} not found", id),
        },
        Command::Ranges => serde_json::to_value(engine.posting_ranges()?)?,
        Command::Verify => serde_json::to_value(engine.verify()?)?,
    };
    Ok(output)
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries JSON only
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(value) => {
            println!("{}", value);
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}", json!({ "error": format!("{:#}", e) }));
            ExitCode::FAILURE
        }
    }
}
