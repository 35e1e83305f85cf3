//! Topic keyword discovery.
//!
//! Before any page is fetched, coachkb needs the topics the video is about.
//! They come either straight from configuration or from the video transcript,
//! which is sent to the LLM with a keyword-extraction prompt. Either way the
//! result is a non-empty, de-duplicated, ordered keyword list.

mod parser;

use coachkb_llm::LlmClient;
use coachkb_shared::{CoachKbError, Result, TranscriptSegment};
use tracing::{info, instrument};

pub use parser::{load_transcript, normalize_keywords, parse_keyword_list, parse_transcript};

// ---------------------------------------------------------------------------
// KeywordSource
// ---------------------------------------------------------------------------

/// Where the keywords for a run come from.
#[derive(Debug, Clone)]
pub enum KeywordSource {
    /// A pre-configured keyword list, passed through as-is.
    Configured(Vec<String>),
    /// A transcript to extract keywords from with the LLM.
    Transcript(Vec<TranscriptSegment>),
}

impl KeywordSource {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configured(_) => "configured",
            Self::Transcript(_) => "transcript",
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Resolve the keyword list for a run.
///
/// Fails with [`CoachKbError::MalformedResponse`] when the extraction reply
/// lacks content, and with a validation error when no keyword survives parsing.
/// An empty list would silently produce an empty knowledge base downstream.
#[instrument(skip_all, fields(source = source.kind()))]
pub async fn resolve_keywords(
    source: &KeywordSource,
    llm: &dyn LlmClient,
    extractor_prompt: &str,
) -> Result<Vec<String>> {
    let keywords = match source {
        KeywordSource::Configured(list) => normalize_keywords(list),
        KeywordSource::Transcript(segments) => {
            if segments.is_empty() {
                return Err(CoachKbError::validation(
                    "cannot extract keywords from an empty transcript",
                ));
            }
            let transcript = serde_json::to_string(segments).map_err(|e| {
                CoachKbError::validation(format!("transcript serialization failed: {e}"))
            })?;

            info!(segments = segments.len(), "extracting keywords from transcript");
            let reply = llm.complete(extractor_prompt, &transcript).await?;
            parse_keyword_list(&reply)
        }
    };

    if keywords.is_empty() {
        return Err(CoachKbError::validation(format!(
            "{} keyword source produced no keywords",
            source.kind()
        )));
    }

    info!(count = keywords.len(), ?keywords, "keywords resolved");
    Ok(keywords)
}
