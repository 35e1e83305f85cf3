//! End-to-end `build` pipeline: keywords → pages → raw checkpoint → entries → export.
//!
//! Each checkpoint file gates its own stage. With both files present a run
//! makes no external calls at all.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use coachkb_crawler::PageSource;
use coachkb_discovery::{KeywordSource, resolve_keywords};
use coachkb_llm::LlmClient;
use coachkb_shared::{CoachKbError, FailedPage, PipelineConfig, Prompts, Result};
use coachkb_storage::{DedupStore, load_raw, save_raw, write_failed_pages};

use crate::chunker::{self, ChunkOptions};
use crate::collect::{self, CollectRequest};
use crate::enrichment::{self, ExportOptions, ExportReport};

/// Collaborators shared by every stage, constructed once by the caller.
#[derive(Clone)]
pub struct PipelineContext {
    pub llm: Arc<dyn LlmClient>,
    pub source: Arc<dyn PageSource>,
    pub prompts: Prompts,
}

/// Result of [`run_pipeline`].
#[derive(Debug)]
pub struct BuildReport {
    /// The raw checkpoint existed and collection was skipped.
    pub raw_reused: bool,
    /// Keywords used for collection (empty when the raw checkpoint was reused).
    pub keywords: Vec<String>,
    /// Pages in the raw checkpoint.
    pub page_count: usize,
    /// Pages that could not be collected in this run.
    pub failed_pages: Vec<FailedPage>,
    /// Export outcome; `None` when the export checkpoint already existed.
    pub export: Option<ExportReport>,
    pub elapsed: Duration,
}

impl BuildReport {
    /// True when this run left a complete export behind.
    pub fn is_complete(&self) -> bool {
        self.export.as_ref().is_none_or(|export| export.committed)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a keyword is searched.
    fn keyword_started(&self, keyword: &str, current: usize, total: usize);
    /// Called as each export entry is resolved.
    fn entry_exported(&self, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn keyword_started(&self, _keyword: &str, _current: usize, _total: usize) {}
    fn entry_exported(&self, _current: usize, _total: usize) {}
    fn done(&self, _report: &BuildReport) {}
}

/// Run the checkpointed pipeline.
///
/// 1. Raw stage (skipped when the raw checkpoint exists): resolve keywords,
///    collect and tag pages, persist the page map and the failed-pages report
/// 2. Export stage (skipped when the export exists): chunk, enrich, write
///
/// `keyword_source` is only consulted by the raw stage.
#[instrument(skip_all, fields(output_dir = %config.output_dir.display()))]
pub async fn run_pipeline(
    config: &PipelineConfig,
    ctx: &PipelineContext,
    keyword_source: Option<&KeywordSource>,
    progress: &dyn ProgressReporter,
) -> Result<BuildReport> {
    let start = Instant::now();
    config.validate()?;

    // --- Raw stage ---
    let raw_path = config.raw_path();
    let raw_reused = raw_path.exists();
    let mut keywords = Vec::new();
    let mut failed_pages = Vec::new();

    let store = if raw_reused {
        progress.phase("Loading raw page checkpoint");
        info!(path = %raw_path.display(), "raw checkpoint found, skipping collection");
        load_raw(&raw_path)?
    } else {
        let source = keyword_source.ok_or_else(|| {
            CoachKbError::validation(
                "no keyword source: configure video tags or a transcript",
            )
        })?;

        progress.phase("Resolving keywords");
        keywords =
            resolve_keywords(source, ctx.llm.as_ref(), &ctx.prompts.keyword_extractor).await?;

        progress.phase("Collecting pages");
        let request = CollectRequest {
            keywords: &keywords,
            results_per_search: config.results_per_search,
            selector_prompt: &ctx.prompts.keyword_selector,
        };
        let mut store = DedupStore::new();
        failed_pages = collect::collect_pages(
            ctx.source.as_ref(),
            ctx.llm.as_ref(),
            &request,
            &mut store,
            progress,
        )
        .await?;

        for failed in &failed_pages {
            warn!(title = %failed.title, error = %failed.error.label(), "failed page");
        }

        save_raw(&raw_path, &store)?;
        write_failed_pages(&config.failed_pages_path(), &failed_pages)?;
        store
    };

    // --- Export stage ---
    let export_path = config.export_path();
    let export = if export_path.exists() {
        progress.phase("Export already present");
        info!(path = %export_path.display(), "export checkpoint found, skipping export");
        None
    } else {
        progress.phase("Chunking pages");
        let options = ChunkOptions {
            chunk_size: config.chunk_size,
            overlap: config.overlap,
            enrich_text_chunks: config.enrich_text_chunks,
        };
        let entries = chunker::build_entries(&store, &config.source_label, &options, &ctx.prompts)?;
        info!(pages = store.len(), entries = entries.len(), "entries built");

        progress.phase("Enriching and exporting");
        let options = ExportOptions {
            concurrency: config.concurrency,
            ordered: config.ordered_output,
        };
        let report = enrichment::export_entries(
            entries,
            ctx.llm.clone(),
            &ctx.prompts.knowledge_base_transform,
            &export_path,
            &options,
            progress,
        )
        .await?;
        Some(report)
    };

    let report = BuildReport {
        raw_reused,
        keywords,
        page_count: store.len(),
        failed_pages,
        export,
        elapsed: start.elapsed(),
    };

    info!(
        pages = report.page_count,
        failed_pages = report.failed_pages.len(),
        complete = report.is_complete(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "pipeline finished"
    );
    progress.done(&report);
    Ok(report)
}
