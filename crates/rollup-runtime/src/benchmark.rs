//! Repeated-run timing of the aggregation pass.

use std::fmt;
use std::time::Instant;

use rollup_core::models::{Click, Impression};
use rollup_core::strategy::ExecutionStrategy;
use rollup_core::Result;
use rollup_data::aggregator::ClickAggregator;
use serde::Serialize;

/// Rounds per strategy when none are configured.
pub const DEFAULT_ROUNDS: u32 = 100;

/// Timing of one strategy over a number of rounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub strategy: ExecutionStrategy,
    pub rounds: u32,
    /// Mean wall-clock time of one aggregation pass, in milliseconds.
    pub average_ms: f64,
    /// Number of aggregates produced by the last round.
    pub aggregate_count: usize,
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Avg time with {} in {} rounds: {:.6} ms, size: {}",
            self.strategy, self.rounds, self.average_ms, self.aggregate_count
        )
    }
}

/// Run the aggregation `rounds` times with `strategy` and average the
/// wall-clock time. `rounds` of zero is treated as one.
///
/// The aggregator, and with it any thread pool, is built once before the
/// timed rounds.
pub fn benchmark(
    clicks: &[Click],
    impressions: &[Impression],
    strategy: ExecutionStrategy,
    rounds: u32,
) -> Result<BenchmarkReport> {
    let rounds = rounds.max(1);
    let mut total_ms = 0.0;
    let mut aggregate_count = 0;
    let aggregator = ClickAggregator::new(strategy)?;

    for _ in 0..rounds {
        let start = Instant::now();
        let result = aggregator.run(clicks, impressions);
        // Read the result inside the timed section so the pass is not elided.
        aggregate_count = result.aggregates.len();
        total_ms += start.elapsed().as_secs_f64() * 1000.0;
    }

    Ok(BenchmarkReport {
        strategy,
        rounds,
        average_ms: total_ms / f64::from(rounds),
        aggregate_count,
    })
}
