use clap::Parser;
use std::path::PathBuf;

use crate::error::{Result, RollupError};
use crate::strategy::ExecutionStrategy;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Join ad clicks to impressions and roll them up per app and country
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ad-rollup",
    about = "Join ad clicks to impressions and roll them up per app and country",
    version
)]
pub struct Settings {
    /// Clicks JSON array
    #[arg(long, env = "AD_ROLLUP_CLICKS", default_value = "input/clicks.json")]
    pub clicks: PathBuf,

    /// Impressions JSON array
    #[arg(long, env = "AD_ROLLUP_IMPRESSIONS", default_value = "input/impressions.json")]
    pub impressions: PathBuf,

    /// Output file, overwritten on every run
    #[arg(long, env = "AD_ROLLUP_OUTPUT", default_value = "./output.json")]
    pub output: PathBuf,

    /// Strategy used for the production aggregation pass
    #[arg(long, env = "AD_ROLLUP_STRATEGY", default_value = "sequential", value_parser = ["sequential", "parallel"])]
    pub strategy: String,

    /// Worker threads for parallel aggregation (0 = one per core)
    #[arg(long, env = "AD_ROLLUP_JOBS", default_value = "0")]
    pub jobs: usize,

    /// Also run both strategies, compare their results and time them
    #[arg(long, env = "AD_ROLLUP_RUN_BENCHMARK")]
    pub run_benchmark: bool,

    /// Rounds per strategy when benchmarking (1-10000)
    #[arg(long, env = "AD_ROLLUP_BENCHMARK_ROUNDS", default_value = "100", value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub benchmark_rounds: u32,

    /// Expected total revenue of the input dataset, checked after aggregation
    #[arg(long, env = "AD_ROLLUP_EXPECTED_REVENUE")]
    pub expected_revenue: Option<f64>,

    /// Logging level
    #[arg(long, env = "AD_ROLLUP_LOG_LEVEL", default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse settings from the process arguments and environment.
    pub fn load() -> Self {
        Settings::parse()
    }

    /// Same as [`Settings::load`] but from an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Settings::parse_from(args)
    }

    /// Typed strategy for the production pass, with `jobs` applied.
    pub fn execution_strategy(&self) -> Result<ExecutionStrategy> {
        let strategy: ExecutionStrategy = self.strategy.parse()?;
        Ok(strategy.with_threads(self.jobs))
    }

    /// Reject combinations clap cannot express on its own.
    pub fn validate(&self) -> Result<()> {
        self.execution_strategy()?;

        if let Some(expected) = self.expected_revenue {
            if !expected.is_finite() {
                return Err(RollupError::Config(format!(
                    "expected revenue must be a finite number, got {expected}"
                )));
            }
        }

        if self.clicks == self.output || self.impressions == self.output {
            return Err(RollupError::Config(format!(
                "output path {} would overwrite an input file",
                self.output.display()
            )));
        }

        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
