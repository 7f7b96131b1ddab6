//! Shared types for the ad rollup job.
//!
//! Holds the click/impression/aggregate data model, the error type, the
//! execution strategy selector and the command-line settings.

pub mod error;
pub mod models;
pub mod settings;
pub mod strategy;

pub use error::{Result, RollupError};
