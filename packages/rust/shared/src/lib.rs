//! Shared types, error model, and configuration for coachkb.
//!
//! This crate is the foundation depended on by all other coachkb crates.
//! It provides:
//! - [`CoachKbError`]: the unified error type
//! - Domain types ([`PageRecord`], [`KbEntry`], [`FailedPage`], [`TranscriptSegment`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading) and [`Prompts`]

pub mod config;
pub mod error;
pub mod prompts;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, LlmConfig, PipelineConfig, PipelineSettings, SourceConfig,
    VideoConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_api_key, validate_api_key,
};
pub use error::{CoachKbError, Result};
pub use prompts::Prompts;
pub use types::{
    DEFAULT_SOURCE_LABEL, ExportRow, FailedPage, FailureKind, KbEntry, PageRecord, SearchHit,
    SourcePage, TranscriptSegment, content_hash,
};
