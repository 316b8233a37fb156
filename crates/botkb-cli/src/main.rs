//! # botkb
//!
//! Command-line front end for per-tenant document retrieval: ingest text
//! files, rebuild a tenant from a directory, query it, and inspect it.

#![deny(unsafe_code)]

mod ingest;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use botkb_embeddings::{EmbeddingConfig, EmbeddingService, HttpEmbeddingService};
use botkb_retriever::{RetrieverConfig, TenantRegistry};
use botkb_settings::BotkbSettings;
use clap::{Parser, Subcommand};

/// botkb: per-tenant document retrieval.
#[derive(Parser, Debug)]
#[command(name = "botkb", about = "Per-tenant document retrieval over local vector indexes")]
struct Cli {
    /// Settings file (defaults to `~/.botkb/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Data root holding one directory per tenant (overrides settings).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed one text file and append it to a tenant's index.
    Add {
        /// Tenant key.
        #[arg(long)]
        tenant: String,
        /// Text file to add.
        file: PathBuf,
    },
    /// Replace a tenant's index with every `*.txt` file in a directory.
    Rebuild {
        /// Tenant key.
        #[arg(long)]
        tenant: String,
        /// Directory of text files.
        dir: PathBuf,
    },
    /// Print the passages closest to a question.
    Query {
        /// Tenant key.
        #[arg(long)]
        tenant: String,
        /// Number of passages (clamped to the configured maximum).
        #[arg(long)]
        top_k: Option<usize>,
        /// Print passages as JSON.
        #[arg(long)]
        json: bool,
        /// Question text.
        text: String,
    },
    /// Print index statistics for a tenant.
    Stats {
        /// Tenant key.
        #[arg(long)]
        tenant: String,
    },
}

/// Settings from `path`, or the default location. A missing file means
/// defaults; anything else wrong with the file or the environment is fatal.
fn load_settings(path: Option<&Path>) -> Result<BotkbSettings> {
    let path = path.map_or_else(botkb_settings::settings_path, Path::to_path_buf);
    botkb_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = load_settings(args.settings.as_deref())?;
    if settings.logging.json {
        botkb_logging::init_json_subscriber(&settings.logging.level);
    } else {
        botkb_logging::init_subscriber(&settings.logging.level);
    }

    let data_dir = args
        .data_dir
        .unwrap_or_else(|| PathBuf::from(settings.index.resolved_data_dir()));
    let service: Arc<dyn EmbeddingService> = Arc::new(
        HttpEmbeddingService::new(EmbeddingConfig::from_settings(&settings.embedding))
            .context("Failed to create embedding client")?,
    );
    tracing::debug!(
        data_dir = %data_dir.display(),
        model = service.model_id(),
        "botkb starting"
    );
    let registry = TenantRegistry::new(data_dir, service, RetrieverConfig::from_settings(&settings));

    match args.command {
        Command::Add { tenant, file } => {
            let doc = ingest::read_document(&file)?;
            let source = doc.source.clone().unwrap_or_default();
            let id = registry
                .add_document(&tenant, doc)
                .await
                .with_context(|| format!("Failed to add {}", file.display()))?;
            println!("added {source} to {tenant} as id {id}");
        }
        Command::Rebuild { tenant, dir } => {
            let docs = ingest::load_documents(&dir)?;
            let count = registry
                .rebuild(&tenant, docs)
                .await
                .with_context(|| format!("Failed to rebuild {tenant}"))?;
            println!("rebuilt {tenant} with {count} documents");
        }
        Command::Query {
            tenant,
            top_k,
            json,
            text,
        } => {
            let passages = registry
                .get_relevant(&tenant, &text, top_k)
                .await
                .with_context(|| format!("Failed to query {tenant}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&passages)?);
            } else if passages.is_empty() {
                println!("no passages");
            } else {
                for (rank, p) in passages.iter().enumerate() {
                    println!("{}. [{}] score={:.4}\n{}\n", rank + 1, p.source, p.score, p.text);
                }
            }
        }
        Command::Stats { tenant } => {
            let stats = registry.stats(&tenant).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
