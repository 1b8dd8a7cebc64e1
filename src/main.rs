use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use edict_mining::{
    cache::{fingerprint, ResultCache},
    config::{Config, LogFormat},
    langbase::LangbaseClient,
    AnalysisPipeline, CancellationFlag, Comment, PolicyClause,
};

/// Clause-level argument mining for public policy comments.
#[derive(Parser, Debug)]
#[command(name = "edict", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a comment set and print the result as JSON
    Analyze {
        /// JSON array of comments
        #[arg(long)]
        comments: PathBuf,

        /// JSON array of policy clauses
        #[arg(long)]
        clauses: Option<PathBuf>,

        /// Number of amendment suggestions (clamped to 5..=10)
        #[arg(long)]
        limit: Option<usize>,

        /// Skip the result cache for this run
        #[arg(long)]
        no_cache: bool,
    },

    /// Print the cache key for a comment set
    Fingerprint {
        /// JSON array of comments
        #[arg(long)]
        comments: PathBuf,
    },

    /// Result cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Remove every cached entry
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "edict starting");

    match cli.command {
        Command::Analyze {
            comments,
            clauses,
            limit,
            no_cache,
        } => {
            if no_cache {
                config.cache.enabled = false;
            }
            analyze(&config, &comments, clauses.as_deref(), limit).await
        }
        Command::Fingerprint { comments } => {
            let comments: Vec<Comment> = read_json(&comments).await?;
            println!("{}", fingerprint(&comments)?);
            Ok(())
        }
        Command::Cache {
            action: CacheAction::Clear,
        } => {
            let cache = ResultCache::from_config(&config.cache).await;
            let removed = cache.len().await;
            cache.clear().await?;
            info!(path = %config.cache.path.display(), removed, "Result cache cleared");
            Ok(())
        }
    }
}

async fn analyze(
    config: &Config,
    comments_path: &Path,
    clauses_path: Option<&Path>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let comments: Vec<Comment> = read_json(comments_path).await?;
    let clauses: Vec<PolicyClause> = match clauses_path {
        Some(path) => read_json(path).await?,
        None => Vec::new(),
    };

    // Pipe setup failure degrades to fallback extraction per batch
    if config.langbase.api_key.is_some() {
        match LangbaseClient::new(&config.langbase, config.request.clone()) {
            Ok(client) => {
                if let Err(e) = client
                    .ensure_extraction_pipe(&config.pipes.argument_extraction)
                    .await
                {
                    warn!(error = %e, "Failed to ensure argument extraction pipe exists");
                }
            }
            Err(e) => warn!(error = %e, "Failed to initialize Langbase client"),
        }
    }

    let pipeline = AnalysisPipeline::from_config(config).await;

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, skipping remaining batches");
            on_interrupt.cancel();
        }
    });

    match pipeline.run_analysis(&comments, &clauses, limit, &cancel).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Analysis failed");
            Err(e.into())
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        anyhow::anyhow!("Failed to read {}: {}", path.display(), e)
    })?;
    let value = serde_json::from_slice(&bytes).map_err(|e| {
        anyhow::anyhow!("Failed to parse {}: {}", path.display(), e)
    })?;
    Ok(value)
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
