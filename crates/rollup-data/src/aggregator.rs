//! Click-to-impression join and per-(app, country) aggregation.
//!
//! One aggregation routine serves both execution strategies. Sequential mode
//! folds every impression into a single table; parallel mode lets each rayon
//! worker fold its own slice into a private table and then merges tables by
//! summing counters and revenue. No table is shared between threads.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rayon::prelude::*;
use rayon::ThreadPool;
use rollup_core::models::{
    is_valid_country_code, normalize_country_code, Aggregate, AggregateKey, Click, Impression,
};
use rollup_core::strategy::ExecutionStrategy;
use rollup_core::{Result, RollupError};
use serde::Serialize;
use tracing::{debug, warn};

// ── ClickIndex ────────────────────────────────────────────────────────────────

/// Clicks grouped by the impression id they reference.
#[derive(Debug, Default)]
pub struct ClickIndex<'a> {
    by_impression: HashMap<&'a str, Vec<&'a Click>>,
}

impl<'a> ClickIndex<'a> {
    pub fn build(clicks: &'a [Click]) -> Self {
        let mut by_impression: HashMap<&'a str, Vec<&'a Click>> = HashMap::new();
        for click in clicks {
            by_impression
                .entry(click.impression_id.as_str())
                .or_default()
                .push(click);
        }
        Self { by_impression }
    }

    /// Clicks referencing `impression_id`; empty when there are none.
    pub fn clicks_for(&self, impression_id: &str) -> &[&'a Click] {
        self.by_impression
            .get(impression_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct impression ids referenced by at least one click.
    pub fn len(&self) -> usize {
        self.by_impression.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_impression.is_empty()
    }
}

// ── AggregateStats ────────────────────────────────────────────────────────────

/// Running counters for one aggregate key.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateStats {
    pub impressions: u64,
    pub clicks: u64,
    pub revenue: f64,
}

impl AggregateStats {
    /// Count one clicked impression with its matched clicks and their revenue.
    pub fn add_impression(&mut self, clicks: u64, revenue: f64) {
        self.impressions += 1;
        self.clicks += clicks;
        self.revenue += revenue;
    }

    /// Fold another partial result for the same key into this one.
    pub fn merge(&mut self, other: &AggregateStats) {
        self.impressions += other.impressions;
        self.clicks += other.clicks;
        self.revenue += other.revenue;
    }
}

// ── Drops ─────────────────────────────────────────────────────────────────────

/// Why a clicked impression was left out of every aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    MissingAppId,
    InvalidCountryCode { country_code: String },
}

/// A clicked impression that could not be keyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedImpression {
    pub impression_id: String,
    #[serde(flatten)]
    pub reason: DropReason,
}

impl fmt::Display for DroppedImpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            DropReason::MissingAppId => {
                write!(f, "impression {} has no app id", self.impression_id)
            }
            DropReason::InvalidCountryCode { country_code } => write!(
                f,
                "impression {} has invalid country code {:?}",
                self.impression_id, country_code
            ),
        }
    }
}

// ── Per-impression outcome ────────────────────────────────────────────────────

/// What the join decided for a single impression.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// No click references the impression.
    NoClick,
    /// Clicked, but the impression cannot be keyed.
    Dropped(DroppedImpression),
    /// Clicked and keyed.
    Matched {
        key: AggregateKey,
        clicks: u64,
        revenue: f64,
    },
}

/// Join one impression against the click index.
pub fn join_impression(index: &ClickIndex<'_>, impression: &Impression) -> JoinOutcome {
    let clicks = index.clicks_for(&impression.id);
    if clicks.is_empty() {
        return JoinOutcome::NoClick;
    }

    let Some(app_id) = impression.app_id else {
        return JoinOutcome::Dropped(DroppedImpression {
            impression_id: impression.id.clone(),
            reason: DropReason::MissingAppId,
        });
    };

    let country_code = normalize_country_code(impression.country_code.as_deref());
    if !is_valid_country_code(country_code) {
        return JoinOutcome::Dropped(DroppedImpression {
            impression_id: impression.id.clone(),
            reason: DropReason::InvalidCountryCode {
                country_code: country_code.to_string(),
            },
        });
    }

    JoinOutcome::Matched {
        key: AggregateKey::new(app_id, country_code),
        clicks: clicks.len() as u64,
        revenue: clicks.iter().map(|c| c.revenue_or_zero()).sum(),
    }
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

/// Counts and warnings collected during one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationDiagnostics {
    /// Impressions the pass iterated over.
    pub impressions_seen: usize,
    /// Impressions no click referenced.
    pub impressions_with_no_click: usize,
    /// Impressions folded into an aggregate.
    pub impressions_aggregated: usize,
    /// Clicks attributed to aggregated impressions.
    pub clicks_attributed: u64,
    /// Clicked impressions that could not be keyed.
    pub dropped: Vec<DroppedImpression>,
}

impl AggregationDiagnostics {
    fn merge(&mut self, other: AggregationDiagnostics) {
        self.impressions_seen += other.impressions_seen;
        self.impressions_with_no_click += other.impressions_with_no_click;
        self.impressions_aggregated += other.impressions_aggregated;
        self.clicks_attributed += other.clicks_attributed;
        self.dropped.extend(other.dropped);
    }

    /// Emit one warning per dropped impression.
    pub fn log_dropped(&self) {
        for dropped in &self.dropped {
            warn!("{dropped}");
        }
    }
}

// ── Aggregation ───────────────────────────────────────────────────────────────

/// Result of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// One entry per distinct key, sorted by app id then country code.
    pub aggregates: Vec<Aggregate>,
    pub diagnostics: AggregationDiagnostics,
}

impl Aggregation {
    pub fn impressions_with_no_click(&self) -> usize {
        self.diagnostics.impressions_with_no_click
    }

    /// Sum of `impressions` across all aggregates.
    pub fn aggregated_impressions(&self) -> u64 {
        self.aggregates.iter().map(|a| a.impressions).sum()
    }

    /// Sum of `revenue` across all aggregates.
    pub fn total_revenue(&self) -> f64 {
        self.aggregates.iter().map(|a| a.revenue).sum()
    }

    pub fn get(&self, key: &AggregateKey) -> Option<&Aggregate> {
        self.aggregates
            .binary_search_by(|a| {
                (a.app_id, a.country_code.as_str()).cmp(&(key.app_id, key.country_code.as_str()))
            })
            .ok()
            .map(|i| &self.aggregates[i])
    }
}

/// Per-worker accumulation state.
#[derive(Debug, Default)]
struct PartialAggregation {
    table: BTreeMap<AggregateKey, AggregateStats>,
    diagnostics: AggregationDiagnostics,
}

impl PartialAggregation {
    fn absorb(mut self, index: &ClickIndex<'_>, impression: &Impression) -> Self {
        self.diagnostics.impressions_seen += 1;
        match join_impression(index, impression) {
            JoinOutcome::NoClick => self.diagnostics.impressions_with_no_click += 1,
            JoinOutcome::Dropped(dropped) => {
                debug!("{dropped}");
                self.diagnostics.dropped.push(dropped);
            }
            JoinOutcome::Matched {
                key,
                clicks,
                revenue,
            } => {
                self.diagnostics.impressions_aggregated += 1;
                self.diagnostics.clicks_attributed += clicks;
                self.table
                    .entry(key)
                    .or_default()
                    .add_impression(clicks, revenue);
            }
        }
        self
    }

    fn merge(mut self, mut other: Self) -> Self {
        if other.table.len() > self.table.len() {
            std::mem::swap(&mut self.table, &mut other.table);
        }
        for (key, stats) in other.table {
            self.table.entry(key).or_default().merge(&stats);
        }
        self.diagnostics.merge(other.diagnostics);
        self
    }

    fn finish(self) -> Aggregation {
        let aggregates = self
            .table
            .into_iter()
            .map(|(key, stats)| Aggregate {
                app_id: key.app_id,
                country_code: key.country_code,
                impressions: stats.impressions,
                clicks: stats.clicks,
                revenue: stats.revenue,
            })
            .collect();

        Aggregation {
            aggregates,
            diagnostics: self.diagnostics,
        }
    }
}

// ── ClickAggregator ───────────────────────────────────────────────────────────

/// Entry point for the join-and-aggregate pass.
///
/// A parallel aggregator owns its rayon pool, so repeated passes through the
/// same aggregator reuse the worker threads.
#[derive(Debug)]
pub struct ClickAggregator {
    strategy: ExecutionStrategy,
    pool: Option<ThreadPool>,
}

impl ClickAggregator {
    /// Prepare an aggregator for `strategy`, building its thread pool when
    /// the strategy is parallel.
    pub fn new(strategy: ExecutionStrategy) -> Result<Self> {
        let pool = match strategy {
            ExecutionStrategy::Sequential => None,
            ExecutionStrategy::Parallel { threads } => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| RollupError::ThreadPool(e.to_string()))?,
            ),
        };
        Ok(Self { strategy, pool })
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Worker threads of the owned pool; `None` when sequential.
    pub fn threads(&self) -> Option<usize> {
        self.pool.as_ref().map(ThreadPool::current_num_threads)
    }

    /// One-shot pass: build an aggregator for `strategy` and run it once.
    pub fn aggregate(
        clicks: &[Click],
        impressions: &[Impression],
        strategy: ExecutionStrategy,
    ) -> Result<Aggregation> {
        Ok(Self::new(strategy)?.run(clicks, impressions))
    }

    /// Join `clicks` to `impressions` and group the clicked impressions by
    /// (app id, country code).
    ///
    /// `impressions` is expected to be de-duplicated already. Clicks that
    /// reference no impression are ignored.
    pub fn run(&self, clicks: &[Click], impressions: &[Impression]) -> Aggregation {
        let index = ClickIndex::build(clicks);
        debug!(
            "Indexed {} clicks over {} impression ids",
            clicks.len(),
            index.len()
        );

        let partial = match &self.pool {
            None => impressions
                .iter()
                .fold(PartialAggregation::default(), |acc, imp| {
                    acc.absorb(&index, imp)
                }),
            Some(pool) => pool.install(|| {
                impressions
                    .par_iter()
                    .fold(PartialAggregation::default, |acc, imp| {
                        acc.absorb(&index, imp)
                    })
                    .reduce(PartialAggregation::default, PartialAggregation::merge)
            }),
        };

        partial.finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
