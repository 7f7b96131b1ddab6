//! Post-aggregation sanity checks.
//!
//! Checks never alter the aggregation result. Every mismatch is logged as a
//! computation error and returned in a [`ConsistencyReport`]; none of them
//! abort the run.

use std::fmt;

use serde::Serialize;
use tracing::{error, info};

use crate::aggregator::Aggregation;

/// Relative tolerance used when comparing revenue totals.
pub const REVENUE_TOLERANCE: f64 = 1e-9;

/// A failed consistency check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    /// Aggregated plus no-click impressions do not add up to the input count.
    ImpressionCount {
        aggregated: u64,
        with_no_click: usize,
        total: usize,
    },
    /// Total aggregated revenue differs from the configured expectation.
    RevenueTotal { computed: f64, expected: f64 },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyIssue::ImpressionCount {
                aggregated,
                with_no_click,
                total,
            } => write!(
                f,
                "compute error: imps count ({aggregated} aggregated + {with_no_click} without click != {total} total)"
            ),
            ConsistencyIssue::RevenueTotal { computed, expected } => write!(
                f,
                "compute error: sum revenue ({computed} != expected {expected})"
            ),
        }
    }
}

/// Outcome of running every check against one aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub total_impressions: usize,
    pub impressions_with_click: u64,
    pub impressions_with_no_click: usize,
    pub sum_revenue: f64,
    pub expected_revenue: Option<f64>,
    pub issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Runs the impression-count and (optionally) revenue-total checks.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyChecker {
    expected_revenue: Option<f64>,
}

impl ConsistencyChecker {
    /// `expected_revenue` is the revenue total of a known input dataset.
    /// Leave it `None` for arbitrary inputs.
    pub fn new(expected_revenue: Option<f64>) -> Self {
        Self { expected_revenue }
    }

    /// Check `aggregation` against the number of impressions it was built from.
    pub fn check(&self, aggregation: &Aggregation, total_impressions: usize) -> ConsistencyReport {
        let impressions_with_click = aggregation.aggregated_impressions();
        let impressions_with_no_click = aggregation.impressions_with_no_click();
        let sum_revenue = aggregation.total_revenue();

        info!("Impressions with no click: {impressions_with_no_click}");
        info!("Impressions with click: {impressions_with_click}");
        info!("Aggregated revenue: {sum_revenue}");

        let mut issues = Vec::new();

        if impressions_with_click + impressions_with_no_click as u64 != total_impressions as u64 {
            issues.push(ConsistencyIssue::ImpressionCount {
                aggregated: impressions_with_click,
                with_no_click: impressions_with_no_click,
                total: total_impressions,
            });
        }

        if let Some(expected) = self.expected_revenue {
            if !revenue_matches(sum_revenue, expected) {
                issues.push(ConsistencyIssue::RevenueTotal {
                    computed: sum_revenue,
                    expected,
                });
            }
        }

        for issue in &issues {
            error!("{issue}");
        }

        ConsistencyReport {
            total_impressions,
            impressions_with_click,
            impressions_with_no_click,
            sum_revenue,
            expected_revenue: self.expected_revenue,
            issues,
        }
    }
}

/// Whether two revenue totals agree within [`REVENUE_TOLERANCE`].
pub fn revenue_matches(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= REVENUE_TOLERANCE * scale
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{AggregationDiagnostics, DropReason, DroppedImpression};
    use rollup_core::models::Aggregate;

    fn aggregation(aggs: &[(i64, &str, u64, u64, f64)], no_click: usize) -> Aggregation {
        Aggregation {
            aggregates: aggs
                .iter()
                .map(|&(app_id, cc, impressions, clicks, revenue)| Aggregate {
                    app_id,
                    country_code: cc.to_string(),
                    impressions,
                    clicks,
                    revenue,
                })
                .collect(),
            diagnostics: AggregationDiagnostics {
                impressions_with_no_click: no_click,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_balanced_counts_pass() {
        let agg = aggregation(&[(1, "US", 2, 3, 1.0), (2, "DE", 1, 1, 0.5)], 4);
        let report = ConsistencyChecker::new(None).check(&agg, 7);
        assert!(report.is_consistent());
        assert_eq!(report.impressions_with_click, 3);
        assert_eq!(report.impressions_with_no_click, 4);
        assert!((report.sum_revenue - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_count_mismatch_reported() {
        let agg = aggregation(&[(1, "US", 2, 3, 1.0)], 1);
        let report = ConsistencyChecker::new(None).check(&agg, 4);
        assert!(!report.is_consistent());
        assert_eq!(
            report.issues,
            vec![ConsistencyIssue::ImpressionCount {
                aggregated: 2,
                with_no_click: 1,
                total: 4,
            }]
        );
    }

    #[test]
    fn test_malformed_drop_unbalances_counts() {
        let mut agg = aggregation(&[(1, "US", 1, 1, 1.0)], 0);
        agg.diagnostics.dropped.push(DroppedImpression {
            impression_id: "i3".to_string(),
            reason: DropReason::MissingAppId,
        });
        let report = ConsistencyChecker::new(None).check(&agg, 2);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].to_string().starts_with("compute error: imps count"));
    }

    #[test]
    fn test_revenue_check_skipped_without_expectation() {
        let agg = aggregation(&[(1, "US", 1, 1, 99.0)], 0);
        let report = ConsistencyChecker::default().check(&agg, 1);
        assert!(report.is_consistent());
        assert!(report.expected_revenue.is_none());
    }

    #[test]
    fn test_revenue_check_passes_and_fails() {
        let agg = aggregation(&[(1, "US", 1, 1, 1.25), (1, "FR", 1, 2, 2.5)], 0);

        let ok = ConsistencyChecker::new(Some(3.75)).check(&agg, 2);
        assert!(ok.is_consistent());

        let bad = ConsistencyChecker::new(Some(4.0)).check(&agg, 2);
        assert_eq!(bad.issues.len(), 1);
        assert!(matches!(
            bad.issues[0],
            ConsistencyIssue::RevenueTotal { expected, .. } if expected == 4.0
        ));
        assert!(bad.issues[0].to_string().contains("sum revenue"));
    }

    #[test]
    fn test_revenue_matches_tolerance() {
        assert!(revenue_matches(142.13500956606202, 142.13500956606202));
        assert!(revenue_matches(0.1 + 0.2, 0.3));
        assert!(!revenue_matches(1.0, 1.0001));
        assert!(revenue_matches(0.0, 0.0));
    }
}
