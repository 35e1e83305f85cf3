//! Application configuration for coachkb.
//!
//! User config lives at `~/.coachkb/coachkb.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoachKbError, Result};
use crate::prompts::Prompts;
use crate::types::DEFAULT_SOURCE_LABEL;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "coachkb.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".coachkb";

// ---------------------------------------------------------------------------
// Config structs (matching coachkb.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Encyclopedic page source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Chunking and export settings.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// The video the knowledge base is built for.
    #[serde(default)]
    pub video: VideoConfig,

    /// System prompts.
    #[serde(default)]
    pub prompts: Prompts,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding the checkpoint files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Value written to the `SOURCE` column.
    #[serde(default = "default_source_label")]
    pub source_label: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            source_label: default_source_label(),
        }
    }
}

fn default_output_dir() -> String {
    "generated_files".into()
}
fn default_source_label() -> String {
    DEFAULT_SOURCE_LABEL.into()
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model used for every completion.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_llm_base_url(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "mistralai/mistral-large".into()
}
fn default_llm_timeout() -> u64 {
    60
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// MediaWiki Action API endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Search results considered per keyword.
    #[serde(default = "default_results_per_search")]
    pub results_per_search: usize,

    /// Minimum ms between requests to the source.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            results_per_search: default_results_per_search(),
            rate_limit_ms: default_rate_limit(),
            timeout_secs: default_source_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://en.wikipedia.org/w/api.php".into()
}
fn default_results_per_search() -> usize {
    5
}
fn default_rate_limit() -> u64 {
    50
}
fn default_source_timeout() -> u64 {
    30
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Words per text chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Words shared by consecutive chunks.
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Maximum in-flight enrichment calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Also send text chunks through the LLM rewrite (slow).
    #[serde(default)]
    pub enrich_text_chunks: bool,

    /// Write export rows in input order instead of completion order.
    #[serde(default)]
    pub ordered_output: bool,

    /// Raw page dictionary file name, relative to `output_dir`.
    #[serde(default = "default_raw_file")]
    pub raw_file: String,

    /// Export file name, relative to `output_dir`.
    #[serde(default = "default_export_file")]
    pub export_file: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            concurrency: default_concurrency(),
            enrich_text_chunks: false,
            ordered_output: false,
            raw_file: default_raw_file(),
            export_file: default_export_file(),
        }
    }
}

fn default_chunk_size() -> usize {
    200
}
fn default_overlap() -> usize {
    10
}
fn default_concurrency() -> usize {
    10
}
fn default_raw_file() -> String {
    "wiki_data.json".into()
}
fn default_export_file() -> String {
    "knowledge_base.csv".into()
}

/// `[video]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Pre-configured topic keywords. When set, no transcript extraction happens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Path to a normalized transcript (`[{start, end, text}]` JSON).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding both checkpoints.
    pub output_dir: PathBuf,
    /// Raw page dictionary file name.
    pub raw_file: String,
    /// Export file name.
    pub export_file: String,
    /// `SOURCE` column value.
    pub source_label: String,
    /// Search results considered per keyword.
    pub results_per_search: usize,
    /// Words per text chunk.
    pub chunk_size: usize,
    /// Words shared by consecutive chunks.
    pub overlap: usize,
    /// Maximum in-flight enrichment calls.
    pub concurrency: usize,
    /// Send text chunks through the LLM rewrite too.
    pub enrich_text_chunks: bool,
    /// Emit export rows in input order.
    pub ordered_output: bool,
}

impl PipelineConfig {
    /// Full path of the raw page dictionary checkpoint.
    pub fn raw_path(&self) -> PathBuf {
        self.output_dir.join(&self.raw_file)
    }

    /// Full path of the export checkpoint.
    pub fn export_path(&self) -> PathBuf {
        self.output_dir.join(&self.export_file)
    }

    /// Report of pages that could not be collected.
    pub fn failed_pages_path(&self) -> PathBuf {
        self.output_dir.join("failed_pages.json")
    }

    /// Reject chunking and concurrency settings that cannot make progress.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(CoachKbError::validation("chunk_size must be at least 1"));
        }
        if self.overlap >= self.chunk_size {
            return Err(CoachKbError::validation(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        if self.concurrency == 0 {
            return Err(CoachKbError::validation("concurrency must be at least 1"));
        }
        Ok(())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.defaults.output_dir),
            raw_file: config.pipeline.raw_file.clone(),
            export_file: config.pipeline.export_file.clone(),
            source_label: config.defaults.source_label.clone(),
            results_per_search: config.source.results_per_search,
            chunk_size: config.pipeline.chunk_size,
            overlap: config.pipeline.overlap,
            concurrency: config.pipeline.concurrency,
            enrich_text_chunks: config.pipeline.enrich_text_chunks,
            ordered_output: config.pipeline.ordered_output,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.coachkb/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CoachKbError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.coachkb/coachkb.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CoachKbError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CoachKbError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CoachKbError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CoachKbError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CoachKbError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the LLM API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(CoachKbError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the LLM API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(config).map(|_| ())
}
