//! Raw page checkpoint and failed-pages report.
//!
//! The raw checkpoint is the JSON object `content_hash -> PageRecord`. Its
//! presence means keyword discovery, fetching and tagging are finished.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use coachkb_shared::{CoachKbError, FailedPage, Result};

use crate::{DedupStore, write_atomic};

/// Load the raw page checkpoint.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_raw(path: &Path) -> Result<DedupStore> {
    let content = std::fs::read_to_string(path).map_err(|e| CoachKbError::io(path, e))?;
    let store: DedupStore = serde_json::from_str(&content)
        .map_err(|e| CoachKbError::parse(format!("{}: {e}", path.display())))?;
    debug!(pages = store.len(), "raw checkpoint loaded");
    Ok(store)
}

/// Persist the raw page checkpoint atomically.
#[instrument(skip_all, fields(path = %path.display(), pages = store.len()))]
pub fn save_raw(path: &Path, store: &DedupStore) -> Result<()> {
    let json = serde_json::to_vec_pretty(store)
        .map_err(|e| CoachKbError::parse(format!("failed to serialize pages: {e}")))?;
    write_atomic(path, &json)?;
    debug!("raw checkpoint written");
    Ok(())
}

/// The `failed_pages.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPagesReport {
    pub generated_at: DateTime<Utc>,
    pub failed: Vec<FailedPage>,
}

/// Write the failed-pages report for a fetch run.
pub fn write_failed_pages(path: &Path, failed: &[FailedPage]) -> Result<()> {
    let report = FailedPagesReport {
        generated_at: Utc::now(),
        failed: failed.to_vec(),
    };
    let json = serde_json::to_vec_pretty(&report)
        .map_err(|e| CoachKbError::parse(format!("failed to serialize report: {e}")))?;
    write_atomic(path, &json)
}
