mod bootstrap;

use anyhow::Result;
use rollup_core::settings::Settings;
use rollup_runtime::orchestrator::{OutputStatus, RollupOrchestrator, RunConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("ad-rollup v{} starting", env!("CARGO_PKG_VERSION"));

    let config = RunConfig::try_from(&settings)?;
    tracing::info!(
        "Clicks: {}, Impressions: {}, Strategy: {}, Benchmark: {}",
        config.clicks_path.display(),
        config.impressions_path.display(),
        config.strategy,
        config.run_benchmark
    );

    // Load failures propagate and abort; everything after loading is
    // reported through the summary.
    let summary = RollupOrchestrator::new(config).run().await?;

    if !summary.consistency.is_consistent() {
        tracing::warn!(
            "{} consistency check(s) failed; output written from computed aggregates",
            summary.consistency.issues.len()
        );
    }

    match &summary.output {
        OutputStatus::Written { path } => tracing::info!(
            "Wrote {} aggregates to {}",
            summary.aggregate_count,
            path.display()
        ),
        OutputStatus::Failed { error } => tracing::error!("Output not written: {error}"),
    }

    tracing::debug!(
        "Loaded in {:.3}s, aggregated in {:.3}s",
        summary.load_time_seconds,
        summary.aggregate_time_seconds
    );

    Ok(())
}
