//! Batch pipeline orchestrator.
//!
//! Runs Load → Aggregate → Check → (optional) Compare → Serialize. The
//! CPU-bound steps run on tokio's blocking pool; loading the two feeds
//! happens concurrently since neither depends on the other.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rollup_core::models::{Click, Impression};
use rollup_core::settings::Settings;
use rollup_core::strategy::ExecutionStrategy;
use rollup_core::{Result, RollupError};
use rollup_data::aggregator::{AggregationDiagnostics, ClickAggregator};
use rollup_data::consistency::{ConsistencyChecker, ConsistencyReport};
use rollup_data::equivalence::{compare_aggregates, Equivalence};
use rollup_data::reader::{load_clicks, load_impressions};
use rollup_data::writer::write_aggregates;
use serde::Serialize;
use tracing::{error, info};

use crate::benchmark::{benchmark, BenchmarkReport, DEFAULT_ROUNDS};

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything one run needs, resolved from [`Settings`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub clicks_path: PathBuf,
    pub impressions_path: PathBuf,
    pub output_path: PathBuf,
    /// Strategy for the production pass.
    pub strategy: ExecutionStrategy,
    /// Worker threads for any parallel pass (0 = rayon default).
    pub jobs: usize,
    /// Also run both strategies, compare and time them.
    pub run_benchmark: bool,
    pub benchmark_rounds: u32,
    pub expected_revenue: Option<f64>,
}

impl RunConfig {
    pub fn new(
        clicks_path: impl Into<PathBuf>,
        impressions_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            clicks_path: clicks_path.into(),
            impressions_path: impressions_path.into(),
            output_path: output_path.into(),
            strategy: ExecutionStrategy::Sequential,
            jobs: 0,
            run_benchmark: false,
            benchmark_rounds: DEFAULT_ROUNDS,
            expected_revenue: None,
        }
    }
}

impl TryFrom<&Settings> for RunConfig {
    type Error = RollupError;

    fn try_from(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            clicks_path: settings.clicks.clone(),
            impressions_path: settings.impressions.clone(),
            output_path: settings.output.clone(),
            strategy: settings.execution_strategy()?,
            jobs: settings.jobs,
            run_benchmark: settings.run_benchmark,
            benchmark_rounds: settings.benchmark_rounds,
            expected_revenue: settings.expected_revenue,
        })
    }
}

/// Outcome of the serialization step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutputStatus {
    Written { path: PathBuf },
    Failed { error: String },
}

/// Cross-strategy comparison produced when benchmarking is enabled.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyComparison {
    pub equivalence: Equivalence,
    pub benchmarks: Vec<BenchmarkReport>,
}

/// The complete output of [`RollupOrchestrator::run`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// RFC 3339 timestamp when the run finished.
    pub generated_at: String,
    pub strategy: ExecutionStrategy,
    pub clicks_loaded: usize,
    pub impressions_loaded: usize,
    pub aggregate_count: usize,
    pub diagnostics: AggregationDiagnostics,
    pub consistency: ConsistencyReport,
    pub comparison: Option<StrategyComparison>,
    pub output: OutputStatus,
    /// Wall-clock seconds spent loading both feeds.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent in the production aggregation pass.
    pub aggregate_time_seconds: f64,
}

// ── RollupOrchestrator ────────────────────────────────────────────────────────

/// Drives one batch run from input files to output file.
pub struct RollupOrchestrator {
    config: RunConfig,
}

impl RollupOrchestrator {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline.
    ///
    /// Load failures abort the run. Consistency mismatches and output write
    /// failures are logged and recorded in the summary but do not fail it.
    pub async fn run(&self) -> Result<RunSummary> {
        // ── Step 1: Load ──────────────────────────────────────────────────────
        let load_start = Instant::now();
        let clicks_path = self.config.clicks_path.clone();
        let impressions_path = self.config.impressions_path.clone();
        let (clicks, impressions) = tokio::try_join!(
            blocking(move || load_clicks(&clicks_path)),
            blocking(move || load_impressions(&impressions_path)),
        )?;
        let load_time_seconds = load_start.elapsed().as_secs_f64();
        let clicks = Arc::new(clicks);
        let impressions = Arc::new(impressions);

        // ── Step 2: Aggregate ─────────────────────────────────────────────────
        let aggregate_start = Instant::now();
        let strategy = self.config.strategy;
        let aggregation = {
            let (clicks, impressions) = (Arc::clone(&clicks), Arc::clone(&impressions));
            blocking(move || ClickAggregator::aggregate(&clicks, &impressions, strategy)).await?
        };
        let aggregate_time_seconds = aggregate_start.elapsed().as_secs_f64();
        info!(
            "Aggregated {} impressions into {} keys using {}",
            impressions.len(),
            aggregation.aggregates.len(),
            strategy
        );
        aggregation.diagnostics.log_dropped();

        // ── Step 3: Check ─────────────────────────────────────────────────────
        let consistency = ConsistencyChecker::new(self.config.expected_revenue)
            .check(&aggregation, impressions.len());

        // ── Step 4: Compare strategies ────────────────────────────────────────
        let comparison = if self.config.run_benchmark {
            Some(self.compare_strategies(&clicks, &impressions).await?)
        } else {
            None
        };

        // ── Step 5: Serialize ─────────────────────────────────────────────────
        let output = match write_aggregates(&self.config.output_path, &aggregation.aggregates) {
            Ok(path) => OutputStatus::Written { path },
            Err(e) => {
                error!("error serializing the result: {e}");
                OutputStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        Ok(RunSummary {
            generated_at: chrono::Utc::now().to_rfc3339(),
            strategy,
            clicks_loaded: clicks.len(),
            impressions_loaded: impressions.len(),
            aggregate_count: aggregation.aggregates.len(),
            diagnostics: aggregation.diagnostics,
            consistency,
            comparison,
            output,
            load_time_seconds,
            aggregate_time_seconds,
        })
    }

    // ── Private implementation ────────────────────────────────────────────

    /// Run every strategy to completion, one after the other, then compare
    /// their results. Each strategy gets its own blocking task so timings do
    /// not overlap.
    async fn compare_strategies(
        &self,
        clicks: &Arc<Vec<Click>>,
        impressions: &Arc<Vec<Impression>>,
    ) -> Result<StrategyComparison> {
        let rounds = self.config.benchmark_rounds;
        let mut results = Vec::new();
        let mut benchmarks = Vec::new();

        for strategy in ExecutionStrategy::all(self.config.jobs) {
            let (clicks, impressions) = (Arc::clone(clicks), Arc::clone(impressions));
            let (aggregation, report) = blocking(move || {
                let aggregation = ClickAggregator::aggregate(&clicks, &impressions, strategy)?;
                let report = benchmark(&clicks, &impressions, strategy, rounds)?;
                Ok((aggregation, report))
            })
            .await?;
            results.push(aggregation);
            benchmarks.push(report);
        }

        let equivalence = compare_aggregates(&results[0].aggregates, &results[1].aggregates);

        info!("##################### Benchmark result #####################");
        for report in &benchmarks {
            info!("{report}");
        }
        if equivalence.is_equivalent() {
            info!("implementations are the same");
        } else {
            error!("implementations are not the same");
            for difference in &equivalence.differences {
                error!("{difference}");
            }
        }

        Ok(StrategyComparison {
            equivalence,
            benchmarks,
        })
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Run a fallible CPU-bound closure on tokio's blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RollupError::Other(anyhow::anyhow!("blocking task failed: {e}")))?
}

// ── Tests ─────────────────────────────────────────────────────────────────────
