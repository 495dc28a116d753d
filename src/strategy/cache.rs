//! Feature cache
//!
//! The processed table is stored next to the strategy and keyed by the
//! training table's content hash. A stale, unreadable or absent file is a
//! miss and the caller recomputes.

use crate::error::Result;
use crate::simulator::ProcessedTable;
use crate::storage;
use std::path::Path;
use tracing::debug;

pub const FEATURES_FILE: &str = "features.json";

/// Cached processed table for `hash`, if the file holds one
pub fn load(dir: &Path, hash: &str) -> Option<ProcessedTable> {
    let path = dir.join(FEATURES_FILE);
    match storage::read_json_opt::<ProcessedTable>(&path) {
        Ok(Some(cached)) if cached.hash == hash => Some(cached),
        Ok(Some(_)) => {
            debug!(path = %path.display(), "Feature cache built from another table");
            None
        }
        Ok(None) => None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Feature cache unreadable");
            None
        }
    }
}

pub fn store(dir: &Path, processed: &ProcessedTable) -> Result<()> {
    storage::write_json(&dir.join(FEATURES_FILE), processed)
}
