//! Question answering about a video, grounded in its transcript and the knowledge base.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use coachkb_llm::LlmClient;
use coachkb_shared::{CoachKbError, Prompts, Result, SearchHit, TranscriptSegment};

use crate::search::{DEFAULT_SEARCH_LIMIT, KnowledgeSearch};

/// Earlier user questions included in the prompt.
const HISTORY_QUESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// What the coach knows about the video being watched.
#[derive(Debug, Clone, Default)]
pub struct VideoContext {
    pub tags: Vec<String>,
    pub transcript: Vec<TranscriptSegment>,
}

/// A question as asked at a point in the video.
#[derive(Debug, Clone)]
pub struct Question<'a> {
    pub text: &'a str,
    /// Playback position in seconds.
    pub timestamp: f64,
    pub history: &'a [ChatMessage],
}

#[derive(Debug, Clone)]
pub struct CoachAnswer {
    pub answer: String,
    /// Pages the knowledge-base excerpts came from.
    pub reference_urls: BTreeSet<String>,
    pub hits: Vec<SearchHit>,
}

/// Answers viewer questions with one query-enhancement call, one knowledge
/// search and one completion.
pub struct Coach {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn KnowledgeSearch>,
    prompts: Prompts,
    search_limit: usize,
}

impl Coach {
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn KnowledgeSearch>, prompts: Prompts) -> Self {
        Self {
            llm,
            search,
            prompts,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    #[instrument(skip_all, fields(timestamp = question.timestamp))]
    pub async fn ask(&self, video: &VideoContext, question: &Question<'_>) -> Result<CoachAnswer> {
        if question.text.trim().is_empty() {
            return Err(CoachKbError::validation("question is empty"));
        }

        let query = self
            .llm
            .complete(&self.prompts.query_enhancer, question.text)
            .await?;
        debug!(%query, "query enhanced");

        let hits = self.search.search(query.trim(), self.search_limit).await?;
        info!(hits = hits.len(), "knowledge base searched");

        let prompt = coach_prompt(video, question, &hits)?;
        let answer = self.llm.complete(&self.prompts.coach, &prompt).await?;

        let reference_urls = hits.iter().map(|hit| hit.reference_url.clone()).collect();
        Ok(CoachAnswer {
            answer,
            reference_urls,
            hits,
        })
    }
}

/// Assemble the coach user prompt.
///
/// Only the last few user questions are included: answers are left out so
/// the model does not repeat earlier image links or references.
pub fn coach_prompt(video: &VideoContext, question: &Question<'_>, hits: &[SearchHit]) -> Result<String> {
    let previous: Vec<&ChatMessage> = question
        .history
        .iter()
        .filter(|m| m.role == Role::User)
        .collect();
    let previous = &previous[previous.len().saturating_sub(HISTORY_QUESTIONS)..];

    let excerpts: Vec<String> = hits
        .iter()
        .map(|hit| format!("<excerpt>{}</excerpt>", hit.chunk_text))
        .collect();

    Ok(format!(
        "<previous-user-questions>{}</previous-user-questions>\n\
         <video-tags>{}</video-tags>\n\
         <external-knowledge-base>\n{}\n</external-knowledge-base>\n\
         <video-transcript>{}</video-transcript>\n\
         <user-timestamp>{}</user-timestamp>\n\
         <user-question>{}</user-question>",
        to_json(&previous)?,
        to_json(&video.tags)?,
        excerpts.join("\n"),
        to_json(&video.transcript)?,
        question.timestamp,
        question.text,
    ))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| CoachKbError::validation(format!("prompt serialization failed: {e}")))
}
