//! Background process: periodic keyword aggregation plus daily cache
//! warming. Both tasks are single-flight and survive their own failures;
//! the process only exits on a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use thiserror::Error;
use tracing::info;

use mt_common::aggregation::{AggregationConfig, KeywordAggregationPipeline};
use mt_common::db::{create_pool_from_url, PgDataSource};
use mt_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use mt_common::ranking::{KeywordRankingCache, RedisRankedStore};
use mt_common::schedule::spawn_periodic;
use mt_common::warmer::{CacheWarmer, WarmerConfig};

#[derive(Debug, Clone, Parser)]
#[command(name = "mt-worker", about = "mealtable keyword aggregation and warming worker")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Redis connection string
    #[arg(long, env = "REDIS_URL")]
    redis_url: String,

    /// Seconds between aggregation runs
    #[arg(long, env = "MT_AGGREGATION_INTERVAL_SECS", default_value_t = 300)]
    aggregation_interval_secs: u64,

    /// Seconds between warming runs
    #[arg(long, env = "MT_WARMING_INTERVAL_SECS", default_value_t = 86_400)]
    warming_interval_secs: u64,
}

#[derive(Debug, Error)]
enum WorkerError {
    #[error("database setup failed: {0}")]
    Database(String),
    #[error("redis setup failed: {0}")]
    Redis(String),
    #[error("shutdown signal failed: {0}")]
    Signal(String),
}

async fn run(cli: Cli) -> Result<(), WorkerError> {
    let pool = create_pool_from_url(&cli.database_url)
        .map_err(|err| WorkerError::Database(err.to_string()))?;
    let data = PgDataSource::new(pool);

    let store = RedisRankedStore::connect(&cli.redis_url)
        .await
        .map_err(|err| WorkerError::Redis(err.to_string()))?;
    let cache = KeywordRankingCache::new(Arc::new(store));

    // The warming interval's first tick fires immediately, so autocomplete
    // has answers shortly after startup; a failed warm degrades to
    // relational fallback serving until the next tick.
    let warmer = Arc::new(CacheWarmer::new(
        data.clone(),
        cache.clone(),
        WarmerConfig::from_env(),
    ));

    let pipeline = Arc::new(KeywordAggregationPipeline::new(
        data,
        cache,
        AggregationConfig::from_env(),
    ));

    let aggregation_task = {
        let pipeline = pipeline.clone();
        spawn_periodic(
            "keyword-aggregation",
            Duration::from_secs(cli.aggregation_interval_secs),
            move || {
                let pipeline = pipeline.clone();
                async move {
                    let report = pipeline.run_once(Utc::now()).await?;
                    info!(?report, "aggregation tick complete");
                    Ok::<(), mt_common::aggregation::AggregationError>(())
                }
            },
        )
    };

    let warming_task = {
        let warmer = warmer.clone();
        spawn_periodic(
            "cache-warming",
            Duration::from_secs(cli.warming_interval_secs),
            move || {
                let warmer = warmer.clone();
                async move {
                    let report = warmer.warm_all().await?;
                    info!(?report, "warming tick complete");
                    Ok::<(), mt_common::warmer::WarmingError>(())
                }
            },
        )
    };

    tokio::signal::ctrl_c()
        .await
        .map_err(|err| WorkerError::Signal(err.to_string()))?;
    info!("shutdown signal received, stopping periodic tasks");
    aggregation_task.abort();
    warming_task.abort();
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing_subscriber(env!("CARGO_PKG_NAME"));
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "mt-worker exited with error");
        std::process::exit(1);
    }
}
