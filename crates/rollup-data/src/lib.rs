//! Data layer for the ad rollup job.
//!
//! Loads the clicks and impressions feeds, joins and aggregates them, checks
//! the result for consistency, compares results across execution strategies
//! and writes the aggregate table back out as JSON.

pub mod aggregator;
pub mod consistency;
pub mod equivalence;
pub mod reader;
pub mod writer;

pub use rollup_core as core;
