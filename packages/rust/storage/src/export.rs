//! Knowledge-base CSV export.
//!
//! Rows are written to `<file>.partial` and only renamed to the final name by
//! [`ExportWriter::commit`]. The final file is the export checkpoint, so it
//! must never exist in a half-written state.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use coachkb_shared::{CoachKbError, ExportRow, Result};

/// Header of the export file, in column order.
pub const EXPORT_COLUMNS: [&str; 5] = ["SOURCE", "SOURCE_ID", "CHUNK_TEXT", "TAGS", "REFERENCE_URL"];

/// The in-progress sibling of an export target.
pub fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

/// Sole owner of the export file while a run is in progress.
pub struct ExportWriter {
    writer: csv::Writer<File>,
    target: PathBuf,
    partial: PathBuf,
    rows: usize,
}

impl ExportWriter {
    /// Start a new export for `target`, truncating any earlier partial file.
    pub fn create(target: &Path) -> Result<Self> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoachKbError::io(parent, e))?;
        }

        let partial = partial_path(target);
        let file = File::create(&partial).map_err(|e| CoachKbError::io(&partial, e))?;

        // Header written up front so an export with zero rows is still well-formed.
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer
            .write_record(EXPORT_COLUMNS)
            .map_err(|e| CoachKbError::Export(format!("{}: {e}", partial.display())))?;

        debug!(path = %partial.display(), "export started");
        Ok(Self {
            writer,
            target: target.to_path_buf(),
            partial,
            rows: 0,
        })
    }

    /// Append one complete row.
    pub fn write_row(&mut self, row: &ExportRow) -> Result<()> {
        self.writer
            .serialize(row)
            .map_err(|e| CoachKbError::Export(format!("{}: {e}", self.partial.display())))?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and move the export into its final place.
    pub fn commit(self) -> Result<PathBuf> {
        let (partial, target, rows) = self.close()?;
        std::fs::rename(&partial, &target).map_err(|e| CoachKbError::io(&target, e))?;
        info!(path = %target.display(), rows, "export committed");
        Ok(target)
    }

    /// Flush and leave the export as a partial file for inspection.
    pub fn abandon(self) -> Result<PathBuf> {
        let (partial, _, rows) = self.close()?;
        warn!(path = %partial.display(), rows, "export left incomplete");
        Ok(partial)
    }

    /// Flush and release the file handle.
    fn close(self) -> Result<(PathBuf, PathBuf, usize)> {
        let Self {
            mut writer,
            target,
            partial,
            rows,
        } = self;
        writer.flush().map_err(|e| CoachKbError::io(&partial, e))?;
        drop(writer);
        Ok((partial, target, rows))
    }
}

/// Read every row of an export file.
pub fn read_export(path: &Path) -> Result<Vec<ExportRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| CoachKbError::Export(format!("{}: {e}", path.display())))?;

    reader
        .deserialize()
        .map(|row| {
            row.map_err(|e| CoachKbError::parse(format!("{}: {e}", path.display())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_dir;

    fn row(chunk: &str) -> ExportRow {
        ExportRow {
            source: "Wikipedia".into(),
            source_id: "abc123".into(),
            chunk_text: chunk.into(),
            tags: r#"["Jupiter","Io"]"#.into(),
            reference_url: "https://en.wikipedia.org/wiki/Jupiter".into(),
        }
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("out/knowledge_base.csv")),
            PathBuf::from("out/knowledge_base.csv.partial")
        );
    }

    #[test]
    fn commit_renames_and_rows_read_back() {
        let dir = temp_dir("export");
        let target = dir.join("knowledge_base.csv");

        let mut writer = ExportWriter::create(&target).unwrap();
        writer.write_row(&row("Jupiter, the \"giant\"\nsecond line")).unwrap();
        writer.write_row(&row("plain")).unwrap();
        assert!(!target.exists());

        let written = writer.commit().unwrap();
        assert_eq!(written, target);
        assert!(!partial_path(&target).exists());

        let text = std::fs::read_to_string(&target).unwrap();
        assert!(text.starts_with("SOURCE,SOURCE_ID,CHUNK_TEXT,TAGS,REFERENCE_URL\n"));

        let rows = read_export(&target).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].chunk_text, "Jupiter, the \"giant\"\nsecond line");
        assert_eq!(rows[0].tag_list(), vec!["Jupiter", "Io"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn abandon_keeps_partial_only() {
        let dir = temp_dir("export-abandon");
        let target = dir.join("knowledge_base.csv");

        let mut writer = ExportWriter::create(&target).unwrap();
        writer.write_row(&row("one")).unwrap();
        let left = writer.abandon().unwrap();

        assert_eq!(left, partial_path(&target));
        assert!(left.exists());
        assert!(!target.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_export_has_header() {
        let dir = temp_dir("export-empty");
        let target = dir.join("kb.csv");

        ExportWriter::create(&target).unwrap().commit().unwrap();
        assert!(read_export(&target).unwrap().is_empty());
        assert_eq!(
            std::fs::read_to_string(&target).unwrap().trim(),
            EXPORT_COLUMNS.join(",")
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
