use std::sync::Arc;

use anyhow::Context;

use batchrun_demo::{Pipeline, StdoutConsole};
use batchrun_engine::{SimulatedExecutor, StaticJobSource};

/// Seeds the simulated executor for reproducible runs.
const SEED_ENV: &str = "BATCHRUN_SEED";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    batchrun_observability::init();

    let config = batchrun_engine::config::from_env().context("invalid batch configuration")?;

    let executor = match std::env::var(SEED_ENV).ok().and_then(|s| s.parse().ok()) {
        Some(seed) => SimulatedExecutor::default().with_seed(seed),
        None => {
            tracing::debug!("{SEED_ENV} not set; using an entropy-seeded executor");
            SimulatedExecutor::default()
        }
    };

    let report = Pipeline::new(Arc::new(StdoutConsole), config)
        .run(&StaticJobSource::demo(), executor)
        .await
        .context("batch failed")?;

    tracing::info!(stats = ?report.stats, "demo finished");
    Ok(())
}
