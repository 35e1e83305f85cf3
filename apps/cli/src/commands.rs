//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use coachkb_core::{
    BuildReport, ChatMessage, Coach, ExportIndex, KnowledgeSearch, PipelineContext,
    ProgressReporter, Question, VideoContext, run_pipeline,
};
use coachkb_crawler::WikipediaClient;
use coachkb_discovery::{KeywordSource, load_transcript, resolve_keywords};
use coachkb_llm::{LlmClient, OpenRouterClient};
use coachkb_shared::{
    AppConfig, PipelineConfig, config_file_path, init_config, load_config, load_config_from,
    resolve_api_key, validate_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// coachkb: build and query the knowledge base behind a video companion.
#[derive(Parser)]
#[command(
    name = "coachkb",
    version,
    about = "Build a tagged, enriched knowledge base for a video and answer questions with it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.coachkb/coachkb.toml).
    #[arg(long, global = true, env = "COACHKB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where keywords come from; overrides the `[video]` config section.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct KeywordArgs {
    /// Comma-separated topic keywords.
    #[arg(long, value_delimiter = ',', conflicts_with = "transcript")]
    pub tags: Option<Vec<String>>,

    /// Transcript JSON file (`[{start, end, text}]`) to extract keywords from.
    #[arg(long)]
    pub transcript: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the knowledge base, reusing any checkpoints in the output directory.
    Build {
        #[command(flatten)]
        keywords: KeywordArgs,

        /// Directory for checkpoints and the export.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Resolve and print the keywords a build would use.
    Keywords {
        #[command(flatten)]
        keywords: KeywordArgs,
    },

    /// Search the exported knowledge base.
    Search {
        /// Search query.
        query: String,

        /// Maximum number of hits.
        #[arg(short, long, default_value_t = coachkb_core::DEFAULT_SEARCH_LIMIT)]
        limit: usize,

        /// Directory holding the export.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Ask the coach a question about the configured video.
    Ask {
        /// The viewer's question.
        question: String,

        /// Playback position in seconds.
        #[arg(short, long, default_value_t = 0.0)]
        timestamp: f64,

        /// Knowledge-base excerpts given to the coach.
        #[arg(short, long, default_value_t = coachkb_core::DEFAULT_SEARCH_LIMIT)]
        limit: usize,

        /// JSON file with earlier messages (`[{role, content}]`).
        #[arg(long)]
        history: Option<PathBuf>,

        /// Directory holding the export.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "coachkb=info",
        1 => "coachkb=debug",
        _ => "coachkb=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Build {
            keywords,
            output_dir,
        } => cmd_build(config_path.as_deref(), &keywords, output_dir).await,
        Command::Keywords { keywords } => cmd_keywords(config_path.as_deref(), &keywords).await,
        Command::Search {
            query,
            limit,
            output_dir,
        } => cmd_search(config_path.as_deref(), &query, limit, output_dir).await,
        Command::Ask {
            question,
            timestamp,
            limit,
            history,
            output_dir,
        } => {
            cmd_ask(
                config_path.as_deref(),
                &question,
                timestamp,
                limit,
                history.as_deref(),
                output_dir,
            )
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn pipeline_config(config: &AppConfig, output_dir: Option<PathBuf>) -> PipelineConfig {
    let mut pipeline = PipelineConfig::from(config);
    if let Some(dir) = output_dir {
        pipeline.output_dir = dir;
    }
    pipeline
}

fn open_llm(config: &AppConfig) -> Result<Arc<dyn LlmClient>> {
    let api_key = resolve_api_key(config)?;
    let client = OpenRouterClient::open(&config.llm, &api_key)?;
    info!(model = client.model(), "llm client ready");
    Ok(Arc::new(client))
}

/// Keyword source from flags, falling back to the `[video]` config section.
fn keyword_source(config: &AppConfig, args: &KeywordArgs) -> Result<Option<KeywordSource>> {
    if let Some(tags) = &args.tags {
        return Ok(Some(KeywordSource::Configured(tags.clone())));
    }
    if let Some(path) = &args.transcript {
        return Ok(Some(KeywordSource::Transcript(load_transcript(path)?)));
    }
    if let Some(tags) = &config.video.tags {
        return Ok(Some(KeywordSource::Configured(tags.clone())));
    }
    if let Some(path) = &config.video.transcript_path {
        return Ok(Some(KeywordSource::Transcript(load_transcript(Path::new(path))?)));
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(
    config_path: Option<&Path>,
    keyword_args: &KeywordArgs,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_app_config(config_path)?;
    let pipeline = pipeline_config(&config, output_dir);

    let ctx = PipelineContext {
        llm: open_llm(&config)?,
        source: Arc::new(WikipediaClient::open(&config.source)?),
        prompts: config.prompts.clone(),
    };

    // Keywords only matter when the raw checkpoint has to be built.
    let source = if pipeline.raw_path().exists() {
        None
    } else {
        keyword_source(&config, keyword_args)?
    };

    info!(
        output_dir = %pipeline.output_dir.display(),
        model = %config.llm.model,
        "building knowledge base"
    );

    let reporter = CliProgress::new();
    let report = run_pipeline(&pipeline, &ctx, source.as_ref(), &reporter).await?;

    print_build_summary(&pipeline, &report);

    if !report.is_complete() {
        return Err(eyre!(
            "export incomplete: rerun `coachkb build` to retry the failed entries"
        ));
    }
    Ok(())
}

fn print_build_summary(pipeline: &PipelineConfig, report: &BuildReport) {
    println!();
    if report.raw_reused {
        println!("  Pages:    {} (from {})", report.page_count, pipeline.raw_path().display());
    } else {
        println!("  Keywords: {}", report.keywords.join(", "));
        println!("  Pages:    {}", report.page_count);
    }

    match &report.export {
        Some(export) => {
            println!("  Rows:     {}", export.rows_written);
            println!("  Export:   {}", export.path.display());
            for failure in &export.failures {
                println!(
                    "  ! entry {} ({}): {}",
                    failure.index, failure.reference_url, failure.reason
                );
            }
        }
        None => println!("  Export:   {} (already present)", pipeline.export_path().display()),
    }

    if !report.failed_pages.is_empty() {
        println!();
        println!("  Failed pages:");
        for failed in &report.failed_pages {
            println!("    {}: {}", failed.title, failed.error.label());
        }
    }

    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

async fn cmd_keywords(config_path: Option<&Path>, keyword_args: &KeywordArgs) -> Result<()> {
    let config = load_app_config(config_path)?;
    let source = keyword_source(&config, keyword_args)?
        .ok_or_else(|| eyre!("no keyword source: pass --tags or --transcript, or set [video] in the config"))?;

    let llm = open_llm(&config)?;
    let keywords = resolve_keywords(&source, llm.as_ref(), &config.prompts.keyword_extractor).await?;

    for keyword in keywords {
        println!("{keyword}");
    }
    Ok(())
}

async fn cmd_search(
    config_path: Option<&Path>,
    query: &str,
    limit: usize,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_app_config(config_path)?;
    let export_path = pipeline_config(&config, output_dir).export_path();
    let index = ExportIndex::load(&export_path)?;

    let hits = index.search(query, limit).await?;
    if hits.is_empty() {
        println!("No matches in {} rows.", index.len());
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] {}", rank + 1, hit.score, hit.reference_url);
        println!("   tags: {}", hit.tags.join(", "));
        println!("   {}", hit.chunk_text);
    }
    Ok(())
}

async fn cmd_ask(
    config_path: Option<&Path>,
    question: &str,
    timestamp: f64,
    limit: usize,
    history: Option<&Path>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_app_config(config_path)?;
    let export_path = pipeline_config(&config, output_dir).export_path();

    let history: Vec<ChatMessage> = match history {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| eyre!("cannot read history '{}': {e}", path.display()))?;
            serde_json::from_str(&content)
                .map_err(|e| eyre!("invalid history '{}': {e}", path.display()))?
        }
        None => Vec::new(),
    };

    let video = VideoContext {
        tags: config.video.tags.clone().unwrap_or_default(),
        transcript: match &config.video.transcript_path {
            Some(path) => load_transcript(Path::new(path))?,
            None => Vec::new(),
        },
    };

    let coach = Coach::new(
        open_llm(&config)?,
        Arc::new(ExportIndex::load(&export_path)?),
        config.prompts.clone(),
    )
    .with_search_limit(limit);

    let question = Question {
        text: question,
        timestamp,
        history: &history,
    };
    let answer = coach.ask(&video, &question).await?;

    println!("{}", answer.answer);
    if !answer.reference_urls.is_empty() {
        println!();
        println!("References:");
        for url in &answer.reference_urls {
            println!("  {url}");
        }
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let source = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };

    println!("# {}", source.display());
    match validate_api_key(&config) {
        Ok(()) => println!("# API key: set (${})", config.llm.api_key_env),
        Err(_) => println!("# API key: missing (${})", config.llm.api_key_env),
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn keyword_started(&self, keyword: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Collecting [{current}/{total}] {keyword}"));
    }

    fn entry_exported(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Exporting [{current}/{total}]"));
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn tags_flag_splits_on_commas() {
        let cli = Cli::try_parse_from(["coachkb", "build", "--tags", "Jupiter,Io"]).unwrap();
        let Command::Build { keywords, .. } = cli.command else {
            panic!("expected build");
        };
        assert_eq!(keywords.tags, Some(vec!["Jupiter".to_string(), "Io".to_string()]));
    }

    #[test]
    fn ask_limit_defaults_and_overrides() {
        let cli = Cli::try_parse_from(["coachkb", "ask", "what moon?"]).unwrap();
        let Command::Ask { limit, .. } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(limit, coachkb_core::DEFAULT_SEARCH_LIMIT);

        let cli = Cli::try_parse_from(["coachkb", "ask", "what moon?", "--limit", "2"]).unwrap();
        let Command::Ask { limit, .. } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(limit, 2);
    }

    #[test]
    fn flags_override_config_keywords() {
        let mut config = AppConfig::default();
        config.video.tags = Some(vec!["Saturn".into()]);

        let args = KeywordArgs {
            tags: Some(vec!["Jupiter".into()]),
            transcript: None,
        };
        let Some(KeywordSource::Configured(tags)) = keyword_source(&config, &args).unwrap() else {
            panic!("expected configured keywords");
        };
        assert_eq!(tags, vec!["Jupiter"]);

        let Some(KeywordSource::Configured(tags)) =
            keyword_source(&config, &KeywordArgs::default()).unwrap()
        else {
            panic!("expected configured keywords");
        };
        assert_eq!(tags, vec!["Saturn"]);

        assert!(keyword_source(&AppConfig::default(), &KeywordArgs::default())
            .unwrap()
            .is_none());
    }
}
