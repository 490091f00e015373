mod db;
mod raw_data;
mod transformations;
mod types;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use db::migrations::DEFAULT_MIGRATIONS_DIR;
use db::{DbPool, EntityStore, MemoryStore};
use raw_data::decoding::{decode_logs, DecoderMessage, LogDecoder};
use raw_data::historical::logs::collect_logs;
use transformations::util::preimages::LabelPreimages;
use transformations::{build_registry, DecodedEventsMessage, TransformationEngine};
use types::config::chain::ChainConfig;
use types::config::indexer::IndexerConfig;

const DEFAULT_CONFIG_PATH: &str = "config/config.json";

struct Args {
    config: PathBuf,
    logs: PathBuf,
    chain: Option<String>,
    in_memory: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut config = PathBuf::from(DEFAULT_CONFIG_PATH);
        let mut logs = None;
        let mut chain = None;
        let mut in_memory = false;

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    config = args.next().context("--config requires a path")?.into();
                }
                "--logs" => {
                    logs = Some(PathBuf::from(
                        args.next().context("--logs requires a path")?,
                    ));
                }
                "--chain" => {
                    chain = Some(args.next().context("--chain requires a name")?);
                }
                "--in-memory" => in_memory = true,
                other => anyhow::bail!("Unknown argument: {}", other),
            }
        }

        Ok(Self {
            config,
            logs: logs.context("--logs <file> is required")?,
            chain,
            in_memory,
        })
    }
}

/// Where the engine persists entities for this run.
enum Store {
    Postgres(Arc<DbPool>),
    Memory(Arc<MemoryStore>),
}

impl Store {
    fn entity_store(&self) -> Arc<dyn EntityStore> {
        match self {
            Store::Postgres(pool) => pool.clone() as Arc<dyn EntityStore>,
            Store::Memory(store) => store.clone() as Arc<dyn EntityStore>,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse()?;

    let config = IndexerConfig::load(&args.config)?;
    tracing::info!("Loaded config with {} chain(s)", config.chains.len());

    let chain = config.chain(args.chain.as_deref())?;
    let store = open_store(args.in_memory).await?;

    process_chain(chain, &args.logs, &store).await?;

    if let Store::Memory(memory) = &store {
        let counts = memory.counts().await;
        tracing::info!(
            "In-memory store: {} accounts, {} domains, {} registrations, {} resolvers, {} history events",
            counts.accounts,
            counts.domains,
            counts.registrations,
            counts.resolvers,
            counts.history
        );
    }

    tracing::info!("Chain {} processed successfully", chain.name);
    Ok(())
}

async fn open_store(in_memory: bool) -> anyhow::Result<Store> {
    if in_memory {
        tracing::info!("Using in-memory entity store");
        return Ok(Store::Memory(Arc::new(MemoryStore::new())));
    }

    if env::var("DATABASE_URL").is_err() {
        dotenvy::dotenv().context("DATABASE_URL not set and failed to load .env file")?;
    }
    let database_url = env::var("DATABASE_URL")
        .context("DATABASE_URL not set (pass --in-memory to run without Postgres)")?;

    let pool = DbPool::new(&database_url)
        .await
        .context("failed to create database pool")?;
    pool.run_migrations(Path::new(DEFAULT_MIGRATIONS_DIR))
        .await
        .context("failed to run database migrations")?;

    tracing::info!("Database pool initialized and migrations complete");
    Ok(Store::Postgres(Arc::new(pool)))
}

async fn process_chain(chain: &ChainConfig, logs_path: &Path, store: &Store) -> anyhow::Result<()> {
    tracing::info!("Processing chain: {}", chain.name);

    let preimages = match &chain.label_preimages {
        Some(path) => LabelPreimages::load(path)
            .with_context(|| format!("failed to load label preimages from {}", path.display()))?,
        None => LabelPreimages::new(),
    };

    let registry = build_registry();
    let decoder = LogDecoder::new(&chain.contracts).context("failed to build log decoder")?;

    let channel_cap: usize = env_or("CHANNEL_CAPACITY", 1000);
    let batch_size: usize = env_or("LOG_BATCH_SIZE", 1000);

    let (log_decoder_tx, log_decoder_rx) = mpsc::channel::<DecoderMessage>(channel_cap);
    let (transform_events_tx, transform_events_rx) =
        mpsc::channel::<DecodedEventsMessage>(channel_cap);

    let engine = TransformationEngine::new(
        Arc::new(registry),
        store.entity_store(),
        Arc::new(preimages),
        chain,
    );

    let mut tasks: JoinSet<anyhow::Result<()>> = JoinSet::new();

    tasks.spawn({
        let logs_path = logs_path.to_path_buf();
        async move {
            collect_logs(&logs_path, batch_size, log_decoder_tx)
                .await
                .context("log collection failed")
        }
    });

    tasks.spawn(async move {
        decode_logs(decoder, log_decoder_rx, transform_events_tx)
            .await
            .context("log decoding failed")
    });

    tasks.spawn(async move {
        engine
            .run(transform_events_rx)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("transformation engine error: {}", e))
    });

    while let Some(result) = tasks.join_next().await {
        result.context("pipeline task panicked")??;
    }

    tracing::info!("Completed processing for chain {}", chain.name);
    Ok(())
}
