//! JSON loaders for the clicks and impressions feeds.
//!
//! Each feed is a single JSON array. Loaders fail outright on unreadable or
//! malformed input: aggregation cannot run on a partial collection.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use rollup_core::models::{Click, Impression};
use rollup_core::{Result, RollupError};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

// ── Public API ────────────────────────────────────────────────────────────────

/// Load the clicks array at `path`.
pub fn load_clicks(path: &Path) -> Result<Vec<Click>> {
    let clicks: Vec<Click> = load_json_array(path)?;
    log_clicks_loaded(&clicks);
    Ok(clicks)
}

/// Load the impressions array at `path`, de-duplicated by impression id.
pub fn load_impressions(path: &Path) -> Result<Vec<Impression>> {
    let raw: Vec<Impression> = load_json_array(path)?;
    let impressions = dedup_impressions(raw);
    info!("Loaded {} impressions", impressions.len());
    Ok(impressions)
}

/// Read a clicks array from any stream.
pub fn read_clicks<R: Read>(reader: R) -> Result<Vec<Click>> {
    let clicks: Vec<Click> = serde_json::from_reader(BufReader::new(reader))?;
    log_clicks_loaded(&clicks);
    Ok(clicks)
}

/// Read an impressions array from any stream, de-duplicated by id.
pub fn read_impressions<R: Read>(reader: R) -> Result<Vec<Impression>> {
    let raw: Vec<Impression> = serde_json::from_reader(BufReader::new(reader))?;
    let impressions = dedup_impressions(raw);
    info!("Loaded {} impressions", impressions.len());
    Ok(impressions)
}

/// Drop every impression whose id was already seen.
///
/// The first occurrence wins and the relative order of survivors is kept.
pub fn dedup_impressions(impressions: Vec<Impression>) -> Vec<Impression> {
    let before = impressions.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(before);
    let unique: Vec<Impression> = impressions
        .into_iter()
        .filter(|imp| seen.insert(imp.id.clone()))
        .collect();

    if unique.len() < before {
        debug!(
            "Dropped {} duplicate impressions by id",
            before - unique.len()
        );
    }
    unique
}

/// Sum of click revenue, with missing revenue counted as zero.
pub fn total_revenue(clicks: &[Click]) -> f64 {
    clicks.iter().map(Click::revenue_or_zero).sum()
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn load_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|source| RollupError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_reader(BufReader::new(file)).map_err(|source| RollupError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

fn log_clicks_loaded(clicks: &[Click]) {
    info!("Loaded {} clicks", clicks.len());
    info!("Click revenue total: {}", total_revenue(clicks));
}

// ── Tests ─────────────────────────────────────────────────────────────────────
