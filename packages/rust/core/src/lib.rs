//! Core pipeline orchestration and domain logic for coachkb.
//!
//! This crate ties together keyword discovery, page collection, tagging,
//! chunking and enrichment into the checkpointed `build` workflow, and
//! provides the retrieval side ([`search`], [`coach`]) that consumes its export.

pub mod chunker;
pub mod coach;
pub mod collect;
pub mod enrichment;
pub mod pipeline;
pub mod search;
pub mod tagger;

#[cfg(test)]
pub(crate) mod testing;

pub use coach::{ChatMessage, Coach, CoachAnswer, Question, Role, VideoContext};
pub use enrichment::{EntryFailure, ExportOptions, ExportReport};
pub use pipeline::{BuildReport, PipelineContext, ProgressReporter, SilentProgress, run_pipeline};
pub use search::{DEFAULT_SEARCH_LIMIT, ExportIndex, KnowledgeSearch};
