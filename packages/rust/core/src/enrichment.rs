//! Enrichment and export.
//!
//! Entries are resolved by a bounded pool of tokio tasks. Each task sends its
//! outcome over an mpsc channel to the single consumer, which owns the
//! [`ExportWriter`]. Every task holds a sender clone, so the channel closes
//! exactly when the last task finishes and the consumer drains what is left.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, instrument};

use coachkb_llm::LlmClient;
use coachkb_shared::{ExportRow, KbEntry, Result};
use coachkb_storage::ExportWriter;

use crate::pipeline::ProgressReporter;

/// Pool and ordering settings for [`export_entries`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Maximum in-flight LLM rewrites.
    pub concurrency: usize,
    /// Write rows in entry order instead of completion order.
    pub ordered: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            ordered: false,
        }
    }
}

/// An entry that produced no row.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFailure {
    /// Position in the input entry list.
    pub index: usize,
    pub source_id: String,
    pub reference_url: String,
    pub reason: String,
}

/// Outcome of an export run.
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// Final file when committed, the `.partial` file otherwise.
    pub path: PathBuf,
    pub rows_written: usize,
    pub failures: Vec<EntryFailure>,
    /// True when every entry became a row and the file was moved into place.
    pub committed: bool,
}

/// User prompt for the knowledge-base transform call.
pub fn enrichment_prompt(instruction: &str, text: &str) -> String {
    format!("{instruction} <original-text>{text}</original-text>")
}

/// Resolve one entry to its export row.
pub async fn resolve_entry(
    llm: &dyn LlmClient,
    transform_prompt: &str,
    entry: &KbEntry,
) -> Result<ExportRow> {
    let chunk_text = match &entry.enrichment_prompt {
        Some(instruction) => {
            llm.complete(transform_prompt, &enrichment_prompt(instruction, &entry.chunk_text))
                .await?
        }
        None => entry.chunk_text.clone(),
    };
    Ok(ExportRow::new(entry, chunk_text))
}

type Outcome = (usize, std::result::Result<ExportRow, String>);

/// Resolve `entries` concurrently and write them to `target`.
///
/// Per-entry failures are collected, not raised; the export is committed
/// only when there are none. Errors returned here are I/O failures of the
/// export file itself.
#[instrument(skip_all, fields(entries = entries.len(), target = %target.display()))]
pub async fn export_entries(
    entries: Vec<KbEntry>,
    llm: Arc<dyn LlmClient>,
    transform_prompt: &str,
    target: &Path,
    options: &ExportOptions,
    progress: &dyn ProgressReporter,
) -> Result<ExportReport> {
    let total = entries.len();
    let mut writer = ExportWriter::create(target)?;

    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let transform_prompt: Arc<str> = Arc::from(transform_prompt);
    let (tx, mut rx) = mpsc::channel::<Outcome>(options.concurrency.max(1) * 2);

    let mut meta = Vec::with_capacity(total);
    for (index, entry) in entries.into_iter().enumerate() {
        meta.push((entry.source_id.clone(), entry.reference_url.clone()));

        let tx = tx.clone();
        let llm = llm.clone();
        let semaphore = semaphore.clone();
        let transform_prompt = transform_prompt.clone();

        tokio::spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => resolve_entry(llm.as_ref(), &transform_prompt, &entry)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(format!("worker pool closed: {e}")),
            };
            // Receiver only goes away if the consumer already failed.
            let _ = tx.send((index, outcome)).await;
        });
    }
    drop(tx);

    let mut resolved = vec![false; total];
    let mut failures = Vec::new();
    let mut pending: BTreeMap<usize, Option<ExportRow>> = BTreeMap::new();
    let mut next = 0;
    let mut done = 0;

    while let Some((index, outcome)) = rx.recv().await {
        resolved[index] = true;
        done += 1;
        progress.entry_exported(done, total);

        let row = match outcome {
            Ok(row) => Some(row),
            Err(reason) => {
                let (source_id, reference_url) = meta[index].clone();
                error!(index, %source_id, %reason, "entry failed");
                failures.push(EntryFailure {
                    index,
                    source_id,
                    reference_url,
                    reason,
                });
                None
            }
        };

        if !options.ordered {
            if let Some(row) = row {
                writer.write_row(&row)?;
            }
            continue;
        }

        pending.insert(index, row);
        while let Some(ready) = pending.remove(&next) {
            if let Some(row) = ready {
                writer.write_row(&row)?;
            }
            next += 1;
        }
    }

    // A task that panicked dropped its sender without reporting.
    for (index, _) in resolved.iter().enumerate().filter(|(_, ok)| !**ok) {
        let (source_id, reference_url) = meta[index].clone();
        error!(index, %source_id, "entry worker exited without a result");
        failures.push(EntryFailure {
            index,
            source_id,
            reference_url,
            reason: "worker exited without a result".into(),
        });
    }
    // Rows held behind such a gap are still complete.
    for row in pending.into_values().flatten() {
        writer.write_row(&row)?;
    }

    failures.sort_by_key(|f| f.index);
    let rows_written = writer.rows();
    debug!(rows_written, failures = failures.len(), "export drained");

    if failures.is_empty() {
        let path = writer.commit()?;
        info!(rows = rows_written, "export complete");
        Ok(ExportReport {
            path,
            rows_written,
            failures,
            committed: true,
        })
    } else {
        let path = writer.abandon()?;
        error!(failed = failures.len(), "export incomplete");
        Ok(ExportReport {
            path,
            rows_written,
            failures,
            committed: false,
        })
    }
}
