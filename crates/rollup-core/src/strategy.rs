use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RollupError;

/// How the aggregator walks the impression collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// Single-threaded fold in impression order.
    #[default]
    Sequential,
    /// Partition-then-merge on a rayon pool. `threads == 0` lets rayon pick.
    Parallel { threads: usize },
}

impl ExecutionStrategy {
    /// Both strategies, in the order the benchmark runs them.
    pub fn all(threads: usize) -> [ExecutionStrategy; 2] {
        [
            ExecutionStrategy::Sequential,
            ExecutionStrategy::Parallel { threads },
        ]
    }

    /// Replace the thread count of a parallel strategy.
    pub fn with_threads(self, threads: usize) -> Self {
        match self {
            ExecutionStrategy::Sequential => ExecutionStrategy::Sequential,
            ExecutionStrategy::Parallel { .. } => ExecutionStrategy::Parallel { threads },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecutionStrategy::Sequential => "sequential",
            ExecutionStrategy::Parallel { .. } => "parallel",
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStrategy::Parallel { threads } if *threads > 0 => {
                write!(f, "parallel ({threads} threads)")
            }
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for ExecutionStrategy {
    type Err = RollupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" | "seq" => Ok(ExecutionStrategy::Sequential),
            "parallel" | "par" => Ok(ExecutionStrategy::Parallel { threads: 0 }),
            other => Err(RollupError::Config(format!(
                "unknown execution strategy: {other}"
            ))),
        }
    }
}
