//! System prompts and per-entry instructions.
//!
//! Prompt text is configuration: every field can be overridden from the
//! `[prompts]` section of `coachkb.toml`.

use serde::{Deserialize, Serialize};

/// All prompt text used by the pipeline and the coach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompts {
    /// Turns a transcript into a comma-separated keyword list.
    #[serde(default = "default_keyword_extractor")]
    pub keyword_extractor: String,

    /// Picks the subset of keywords that apply to a page summary.
    #[serde(default = "default_keyword_selector")]
    pub keyword_selector: String,

    /// Rewrites a chunk with added retrieval context.
    #[serde(default = "default_knowledge_base_transform")]
    pub knowledge_base_transform: String,

    /// Expands a viewer question into a search query.
    #[serde(default = "default_query_enhancer")]
    pub query_enhancer: String,

    /// Answers viewer questions.
    #[serde(default = "default_coach")]
    pub coach: String,

    /// Instruction attached to image entries; the page summary is appended.
    #[serde(default = "default_image_description")]
    pub image_description: String,

    /// Instruction attached to text chunks when text enrichment is on.
    #[serde(default = "default_text_context")]
    pub text_context: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            keyword_extractor: default_keyword_extractor(),
            keyword_selector: default_keyword_selector(),
            knowledge_base_transform: default_knowledge_base_transform(),
            query_enhancer: default_query_enhancer(),
            coach: default_coach(),
            image_description: default_image_description(),
            text_context: default_text_context(),
        }
    }
}

fn default_keyword_extractor() -> String {
    "You extract search keywords from video transcripts.\n\
     Return the 5-10 most relevant keywords for encyclopedia lookups, preferring \
     people, places, organizations, scientific terms and notable objects. You may add \
     closely related terms (region of a city, family of a species) when confident.\n\
     Respond with a single comma-separated list and nothing else, for example:\n\
     Algonquin Park,Ontario,Canada,Snapping Turtles,Wildlife"
        .into()
}

fn default_keyword_selector() -> String {
    "You decide which of the available keywords describe an encyclopedia page.\n\
     Use only keywords from <available-keywords>, each at most once; select all, some \
     or none of them based on <page-summary>. Never invent keywords.\n\
     Respond with a single comma-separated list and nothing else."
        .into()
}

fn default_knowledge_base_transform() -> String {
    "You improve chunks of a retrieval knowledge base.\n\
     Reply exactly in this form:\n\
     ORIGINAL: <the original text, unchanged>\n\
     CONTEXT: <about 50 words of factual context: define terms, describe images, \
     explain lists or specifications>\n\
     Never modify the original text and never add opinions."
        .into()
}

fn default_query_enhancer() -> String {
    "You turn a viewer question into a search query for semantic retrieval.\n\
     Drop stop words and question words; add units, scientific terminology, \
     alternative terms, expanded acronyms and common comparisons.\n\
     Respond with space-separated terms only."
        .into()
}

fn default_coach() -> String {
    "You are Coach, an assistant that helps viewers understand the video they are watching.\n\
     You receive <video-tags>, <video-transcript> (start/end in seconds), \
     <user-timestamp>, <external-knowledge-base> excerpts, \
     <previous-user-questions> and the <user-question>.\n\
     Prefer video metadata, then the transcript, then the knowledge base, then general \
     knowledge. Focus on content before the viewer's timestamp. If the answer is not \
     available, say so and ask for clarification.\n\
     Answer concisely in markdown and include any knowledge-base image URLs as markdown \
     images. Decline questions unrelated to the video."
        .into()
}

fn default_image_description() -> String {
    "Provide the best possible description of what this image is based on the filename \
     and provided context. Context:"
        .into()
}

fn default_text_context() -> String {
    "Add retrieval context to this passage using the page summary. Context:".into()
}
