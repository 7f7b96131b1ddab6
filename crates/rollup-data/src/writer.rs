//! JSON serialization of the aggregate table.

use std::path::{Path, PathBuf};

use rollup_core::models::Aggregate;
use rollup_core::{Result, RollupError};
use tracing::info;

/// Write `aggregates` as a pretty-printed JSON array to `path`, replacing any
/// existing file. Missing parent directories are created.
///
/// The document is written to a sibling temp file and renamed into place, so
/// a failed write never leaves a truncated output or a stray temp file behind.
///
/// Returns the absolute path that was written.
pub fn write_aggregates(path: &Path, aggregates: &[Aggregate]) -> Result<PathBuf> {
    let io_err = |source: std::io::Error| RollupError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_string_pretty(aggregates)?;

    let tmp = path.with_extension("json.tmp");
    if let Err(source) = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(source));
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    info!("output json file: {}", absolute.display());
    Ok(absolute)
}

/// Read back a file produced by [`write_aggregates`].
pub fn read_aggregates(path: &Path) -> Result<Vec<Aggregate>> {
    let content = std::fs::read_to_string(path).map_err(|source| RollupError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| RollupError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}
