use std::env;
use std::time::Duration;

use anyhow::Result;
use elastic_pool::{ExecutionModel, LoopControl, Pool, PoolConfig};
use rand::Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Worker count used when ELASTIC_POOL_EXPECTED_COUNT is unset
const DEFAULT_DEMO_WORKERS: u64 = 10;

/// Simulated work per activation
const WORK_DURATION: Duration = Duration::from_secs(1);

/// How often the demo logs pool counts
const REPORT_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elastic_pool=debug,elastic_pool_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("elastic-pool-demo starting...");

    let model: ExecutionModel = env::var("ELASTIC_POOL_MODE")
        .unwrap_or_default()
        .parse()?;

    let mut config = PoolConfig::from_env()?;
    if env::var("ELASTIC_POOL_EXPECTED_COUNT").is_err() {
        config = config.with_expected_count(DEFAULT_DEMO_WORKERS);
    }
    tracing::info!(%model, ?config, "Pool configured");

    let builder = Pool::builder(config);
    let pool = match model {
        ExecutionModel::SingleShot => builder
            .single_shot(|id| async move {
                tracing::info!(worker_id = id, "#{} routine executed", id);
                tokio::time::sleep(WORK_DURATION).await;
            })
            .build()?,
        ExecutionModel::SelfLooping => builder
            .self_looping(|ctx| async move {
                tokio::time::sleep(WORK_DURATION).await;
                // Roughly one iteration in three ends the worker
                let finished = rand::thread_rng().gen_ratio(1, 3);
                if finished {
                    tracing::info!(worker_id = ctx.id(), "Worker finished its loop");
                    LoopControl::Stop
                } else {
                    LoopControl::Continue
                }
            })
            .build()?,
    };

    let mut report = tokio::time::interval(REPORT_INTERVAL);
    loop {
        tokio::select! {
            _ = report.tick() => {
                tracing::info!(
                    expected = pool.expected_count(),
                    current = pool.current_count(),
                    stopping = pool.stopping_count(),
                    "Pool status"
                );
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    pool.shutdown().await?;
    tracing::info!("Demo shutdown complete");
    Ok(())
}
