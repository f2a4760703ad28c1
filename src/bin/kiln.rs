//! kiln: fetch API collections and write flattened tables
//!
//! Usage:
//!   # Products (with reviews) and carts from dummyjson.com into ./raw_data,
//!   # ./processed and dummydb.sqlite
//!   kiln
//!
//!   # Only carts, no database load
//!   kiln carts --no-load
//!
//!   # Settings from a JSON file, with a flag override
//!   kiln --config kiln.json --page-size 50

// Use MiMalloc allocator, as the other binaries do
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use kiln::{EtlConfig, Pipeline, Resource, SqliteLoader, TableLoader};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(about = "Flatten paginated JSON API collections into tables", long_about = None)]
struct Args {
    /// Resources to process (default: all)
    #[arg(value_enum)]
    resources: Vec<Resource>,

    /// JSON config file; flags below override its values
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Base URL of the source API
    #[arg(long)]
    base_url: Option<String>,

    /// Directory for raw artifacts
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// Directory for cleaned artifacts
    #[arg(long)]
    processed_dir: Option<PathBuf>,

    /// Records per page (1-100)
    #[arg(long)]
    page_size: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,

    /// Schema to load tables into
    #[arg(long)]
    schema: Option<String>,

    /// Write artifacts only, skip the database load
    #[arg(long)]
    no_load: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let resources = if args.resources.is_empty() {
        Resource::ALL.to_vec()
    } else {
        args.resources.clone()
    };

    let pipeline = Pipeline::from_config(config).context("Invalid configuration")?;

    let report = if args.no_load {
        pipeline.run(&resources, None)?
    } else {
        let mut loader = SqliteLoader::open(&pipeline.config().database)
            .context("Failed to open database")?;
        pipeline.run(&resources, Some(&mut loader as &mut dyn TableLoader))?
    };

    for table in &report.tables {
        info!(
            table = %table.name,
            rows = table.rows,
            columns = table.columns,
            artifact = %table.artifact.display(),
            loaded = table.loaded,
            "done"
        );
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<EtlConfig> {
    let mut config = match &args.config {
        Some(path) => EtlConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EtlConfig::default(),
    };

    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if let Some(dir) = &args.raw_dir {
        config.raw_dir = dir.clone();
    }
    if let Some(dir) = &args.processed_dir {
        config.processed_dir = dir.clone();
    }
    if let Some(size) = args.page_size {
        config.page_size = size;
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout_secs = secs;
    }
    if let Some(path) = &args.database {
        config.database.path = path.clone();
    }
    if let Some(schema) = &args.schema {
        config.database.schema = schema.clone();
    }

    Ok(config)
}
