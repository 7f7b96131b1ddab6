//! Runtime layer for the ad rollup job.
//!
//! Drives one batch run end to end and, on request, times and cross-checks
//! the two aggregation strategies.

pub mod benchmark;
pub mod orchestrator;

pub use rollup_core as core;
pub use rollup_data as data;
