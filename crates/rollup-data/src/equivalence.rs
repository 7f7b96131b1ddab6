//! Order-independent comparison of two aggregate sets.
//!
//! Used to confirm that both execution strategies agree on the same input.
//! Counters must match exactly; revenue may differ by summation order and is
//! compared with [`revenue_matches`].

use std::collections::HashMap;
use std::fmt;

use rollup_core::models::{Aggregate, AggregateKey};
use serde::Serialize;

use crate::consistency::revenue_matches;

/// A single disagreement between two aggregate sets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateDifference {
    OnlyInLeft { key: String },
    OnlyInRight { key: String },
    Counters {
        key: String,
        left: (u64, u64),
        right: (u64, u64),
    },
    Revenue { key: String, left: f64, right: f64 },
}

impl fmt::Display for AggregateDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateDifference::OnlyInLeft { key } => write!(f, "{key}: only in left result"),
            AggregateDifference::OnlyInRight { key } => write!(f, "{key}: only in right result"),
            AggregateDifference::Counters { key, left, right } => write!(
                f,
                "{key}: impressions/clicks {}/{} vs {}/{}",
                left.0, left.1, right.0, right.1
            ),
            AggregateDifference::Revenue { key, left, right } => {
                write!(f, "{key}: revenue {left} vs {right}")
            }
        }
    }
}

/// Result of comparing two aggregate sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Equivalence {
    pub left_len: usize,
    pub right_len: usize,
    pub differences: Vec<AggregateDifference>,
}

impl Equivalence {
    pub fn is_equivalent(&self) -> bool {
        self.differences.is_empty()
    }
}

/// Compare `left` and `right` as sets keyed by (app id, country code).
///
/// Differences are reported in key order.
pub fn compare_aggregates(left: &[Aggregate], right: &[Aggregate]) -> Equivalence {
    let right_by_key: HashMap<AggregateKey, &Aggregate> =
        right.iter().map(|a| (a.key(), a)).collect();

    let mut differences = Vec::new();
    let mut matched = 0usize;

    let mut left_sorted: Vec<&Aggregate> = left.iter().collect();
    left_sorted.sort_by_key(|a| a.key());

    for l in left_sorted {
        let key = l.key();
        let Some(r) = right_by_key.get(&key) else {
            differences.push(AggregateDifference::OnlyInLeft {
                key: key.to_string(),
            });
            continue;
        };
        matched += 1;

        if (l.impressions, l.clicks) != (r.impressions, r.clicks) {
            differences.push(AggregateDifference::Counters {
                key: key.to_string(),
                left: (l.impressions, l.clicks),
                right: (r.impressions, r.clicks),
            });
        }
        if !revenue_matches(l.revenue, r.revenue) {
            differences.push(AggregateDifference::Revenue {
                key: key.to_string(),
                left: l.revenue,
                right: r.revenue,
            });
        }
    }

    if matched < right.len() {
        let left_keys: std::collections::HashSet<AggregateKey> =
            left.iter().map(Aggregate::key).collect();
        let mut missing: Vec<AggregateKey> = right
            .iter()
            .map(Aggregate::key)
            .filter(|k| !left_keys.contains(k))
            .collect();
        missing.sort();
        differences.extend(missing.into_iter().map(|k| AggregateDifference::OnlyInRight {
            key: k.to_string(),
        }));
    }

    Equivalence {
        left_len: left.len(),
        right_len: right.len(),
        differences,
    }
}
