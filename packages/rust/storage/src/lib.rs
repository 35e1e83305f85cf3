//! File-backed persistence for the knowledge-base pipeline.
//!
//! - [`DedupStore`]: the content-addressed page map
//! - [`checkpoint`]: raw page checkpoint and failed-pages report (JSON)
//! - [`export`]: the knowledge-base CSV writer and reader
//!
//! Every file that gates a pipeline stage is written to a temporary sibling
//! first and renamed into place, so an interrupted run never leaves a
//! checkpoint that looks complete.

pub mod checkpoint;
mod dedup;
pub mod export;

use std::path::Path;

use coachkb_shared::{CoachKbError, Result};

pub use checkpoint::{FailedPagesReport, load_raw, save_raw, write_failed_pages};
pub use dedup::DedupStore;
pub use export::{EXPORT_COLUMNS, ExportWriter, partial_path, read_export};

/// Write `bytes` to `path` via a temp file and rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CoachKbError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CoachKbError::validation(format!("not a file path: {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, bytes).map_err(|e| CoachKbError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| CoachKbError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    /// A fresh, unique scratch directory.
    pub fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("coachkb-{label}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
