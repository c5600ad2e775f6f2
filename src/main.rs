//! # `airflow-docs` CLI
//!
//! Builds and queries a full-text index over the Apache Airflow core
//! documentation (reStructuredText) and the Python client documentation
//! (Markdown), and serves it to agents over HTTP and MCP.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `airflow-docs init` | Create the database and schema |
//! | `airflow-docs index` | Fetch, parse and store every source |
//! | `airflow-docs search "<query>"` | Ranked full-text search |
//! | `airflow-docs get <source> <path>` | Print one page |
//! | `airflow-docs sections` | List sections |
//! | `airflow-docs stats` | Document counts |
//! | `airflow-docs clear --yes` | Remove indexed documents |
//! | `airflow-docs sources` | Source registry and health |
//! | `airflow-docs serve` | HTTP tool API and MCP endpoint |
//!
//! ## Exit codes
//!
//! `0` on success, `1` on a fatal store or configuration error, `2` when
//! every targeted source failed to fetch.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};

use airflow_docs::config::{self, Config};
use airflow_docs::models::Source;
use airflow_docs::store::DocumentStore;
use airflow_docs::{get, ingest, search, server, sources, stats};

const EXIT_FATAL: u8 = 1;
const EXIT_ALL_SOURCES_FAILED: u8 = 2;

/// Index and search the Apache Airflow documentation.
#[derive(Parser)]
#[command(name = "airflow-docs", version)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file; overrides `[db].path`.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema.
    ///
    /// Idempotent. Fails on a database written by another schema version
    /// unless `--force` is given.
    Init {
        /// Drop and recreate the schema, deleting every document.
        #[arg(long)]
        force: bool,
    },

    /// Fetch, parse and store documentation.
    Index {
        /// Only this source (`airflow-core`/`core` or `airflow-python-client`/`client`).
        #[arg(long)]
        source: Option<Source>,

        /// Replace the source's documents instead of updating them.
        #[arg(long)]
        rebuild: bool,

        /// Branch to fetch; overrides `[index].branch`.
        #[arg(long)]
        branch: Option<String>,
    },

    /// Search indexed documentation.
    Search {
        query: String,

        #[arg(long)]
        source: Option<Source>,

        /// Exact section name, as printed by `sections`.
        #[arg(long)]
        section: Option<String>,

        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print one page by source and path.
    Get { source: Source, path: String },

    /// List sections, alphabetically.
    Sections {
        #[arg(long)]
        source: Option<Source>,
    },

    /// Show document counts per source.
    Stats,

    /// Remove indexed documents.
    Clear {
        /// Only this source.
        #[arg(long)]
        source: Option<Source>,

        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// List sources and whether they can be indexed.
    Sources,

    /// Serve the tool API over HTTP (with MCP at `/mcp`), or MCP over stdio.
    Serve {
        #[arg(long)]
        stdio: bool,
    },
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match verbose {
        0 => "airflow_docs=info",
        1 => "airflow_docs=debug",
        _ => "airflow_docs=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut cfg = config::load_or_default(cli.config.as_deref())?;
    if let Some(ref path) = cli.db_path {
        cfg.db.path = path.clone();
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let cfg = load_config(&cli)?;

    match cli.command {
        Commands::Init { force } => {
            let store = if force {
                DocumentStore::reset(&cfg.db.path).await?
            } else {
                DocumentStore::open(&cfg.db.path).await?
            };
            store.close().await;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Index {
            source,
            rebuild,
            branch,
        } => {
            let report = ingest::run_index(&cfg, source, rebuild, branch.as_deref()).await?;
            if report.all_failed() {
                return Ok(ExitCode::from(EXIT_ALL_SOURCES_FAILED));
            }
        }
        Commands::Search {
            query,
            source,
            section,
            limit,
        } => {
            search::run_search(&cfg, &query, source, section.as_deref(), limit).await?;
        }
        Commands::Get { source, path } => {
            get::run_get(&cfg, source, &path).await?;
        }
        Commands::Sections { source } => {
            stats::run_sections(&cfg, source).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Clear { source, yes } => {
            run_clear(&cfg, source, yes).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Serve { stdio } => {
            if stdio {
                server::run_stdio(&cfg).await?;
            } else {
                server::run_server(&cfg).await?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_clear(cfg: &Config, source: Option<Source>, yes: bool) -> Result<()> {
    let target = source.map(Source::as_str).unwrap_or("all sources");
    if !yes {
        bail!("refusing to clear {} without --yes", target);
    }

    let store = DocumentStore::open_existing(&cfg.db.path).await?;
    let removed = store.clear(source).await;
    store.close().await;
    println!("Removed {} documents ({})", removed?, target);
    Ok(())
}
