//! Core domain types for the coachkb knowledge base.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoachKbError;

/// Source label written to the `SOURCE` column when none is configured.
pub const DEFAULT_SOURCE_LABEL: &str = "Wikipedia";

/// Compute the deduplication key of a page: SHA-256 over `title + "\n" + content`.
pub fn content_hash(title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\n");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// A page as returned by the encyclopedic source, before tagging.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    /// Resolved page title (after redirects).
    pub title: String,
    /// Full plain-text body, without the title.
    pub content: String,
    /// Lead-section summary.
    pub summary: String,
    /// Image URLs in source order.
    pub images: Vec<String>,
    /// Canonical page URL.
    pub url: String,
}

impl SourcePage {
    /// The content-addressed key for this page.
    pub fn content_hash(&self) -> String {
        content_hash(&self.title, &self.content)
    }

    /// Title and body joined the way they are stored and chunked.
    pub fn full_content(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }
}

/// A deduplicated, tagged page. Serialized field names match the raw checkpoint format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Title + "\n" + full text.
    #[serde(rename = "page_content")]
    pub content: String,
    #[serde(rename = "page_summary")]
    pub summary: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(rename = "page_url")]
    pub url: String,
    #[serde(rename = "page_tags", default)]
    pub tags: Vec<String>,
}

impl PageRecord {
    /// Build a record from a fetched page and its assigned tags.
    pub fn from_source(page: SourcePage, tags: Vec<String>) -> Self {
        Self {
            content: page.full_content(),
            summary: page.summary,
            images: page.images,
            url: page.url,
            tags,
        }
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Why a search result could not become a [`PageRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The title resolved to a disambiguation page.
    Disambiguation,
    /// The title does not exist.
    MissingPage,
    /// Anything else that went wrong while assembling the record.
    Other(String),
}

impl FailureKind {
    /// Label used in reports, matching the historical error names.
    pub fn label(&self) -> &str {
        match self {
            Self::Disambiguation => "DisambiguationError",
            Self::MissingPage => "PageError",
            Self::Other(message) => message,
        }
    }
}

impl From<&CoachKbError> for FailureKind {
    fn from(err: &CoachKbError) -> Self {
        match err {
            CoachKbError::AmbiguousTitle { .. } => Self::Disambiguation,
            CoachKbError::PageNotFound { .. } => Self::MissingPage,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for FailureKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for FailureKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(match label.as_str() {
            "DisambiguationError" => Self::Disambiguation,
            "PageError" => Self::MissingPage,
            _ => Self::Other(label),
        })
    }
}

/// A search result that was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPage {
    pub title: String,
    pub error: FailureKind,
}

// ---------------------------------------------------------------------------
// Knowledge-base entries
// ---------------------------------------------------------------------------

/// One unit of the knowledge-base export: a text window or an image reference.
#[derive(Debug, Clone, PartialEq)]
pub struct KbEntry {
    /// Fixed origin label (e.g. `Wikipedia`).
    pub source: String,
    /// Content hash of the originating page.
    pub source_id: String,
    /// A word window, or a single image URL.
    pub chunk_text: String,
    /// Tags copied from the page.
    pub tags: Vec<String>,
    /// Canonical URL of the originating page.
    pub reference_url: String,
    /// Instruction for the LLM rewrite; `None` exports `chunk_text` unchanged.
    pub enrichment_prompt: Option<String>,
}

/// A fully resolved export row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    #[serde(rename = "SOURCE")]
    pub source: String,
    #[serde(rename = "SOURCE_ID")]
    pub source_id: String,
    #[serde(rename = "CHUNK_TEXT")]
    pub chunk_text: String,
    /// Tags as a JSON list literal.
    #[serde(rename = "TAGS")]
    pub tags: String,
    #[serde(rename = "REFERENCE_URL")]
    pub reference_url: String,
}

impl ExportRow {
    /// Build a row from an entry and its resolved chunk text.
    pub fn new(entry: &KbEntry, chunk_text: String) -> Self {
        Self {
            source: entry.source.clone(),
            source_id: entry.source_id.clone(),
            chunk_text,
            tags: serde_json::to_string(&entry.tags).unwrap_or_else(|_| "[]".into()),
            reference_url: entry.reference_url.clone(),
        }
    }

    /// Parse the `TAGS` column back into a list. Malformed literals yield no tags.
    pub fn tag_list(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Transcript & retrieval
// ---------------------------------------------------------------------------

/// One caption of a normalized video transcript (times in seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A ranked knowledge-base chunk returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk_text: String,
    pub tags: Vec<String>,
    pub reference_url: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> SourcePage {
        SourcePage {
            title: "Jupiter".into(),
            content: "Jupiter is the fifth planet.".into(),
            summary: "A gas giant.".into(),
            images: vec!["https://upload.example.org/jupiter.jpg".into()],
            url: "https://en.wikipedia.org/wiki/Jupiter".into(),
        }
    }

    #[test]
    fn hash_covers_title_and_content() {
        let hash = page().content_hash();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("Jupiter", "Jupiter is the fifth planet."));
        assert_ne!(hash, content_hash("Saturn", "Jupiter is the fifth planet."));
    }

    #[test]
    fn record_serializes_with_checkpoint_field_names() {
        let record = PageRecord::from_source(page(), vec!["Jupiter".into()]);
        assert_eq!(record.content, "Jupiter\nJupiter is the fifth planet.");

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["page_summary"], "A gas giant.");
        assert_eq!(json["page_url"], "https://en.wikipedia.org/wiki/Jupiter");
        assert_eq!(json["page_tags"][0], "Jupiter");
        assert!(json.get("images").is_some());
    }

    #[test]
    fn failure_kind_labels() {
        let err = CoachKbError::AmbiguousTitle {
            title: "Mercury".into(),
        };
        assert_eq!(FailureKind::from(&err).label(), "DisambiguationError");

        let err = CoachKbError::PageNotFound {
            title: "Nowhere".into(),
        };
        assert_eq!(FailureKind::from(&err), FailureKind::MissingPage);

        let err = CoachKbError::Network("timeout".into());
        assert_eq!(
            FailureKind::from(&err).label(),
            "network error: timeout"
        );
    }

    #[test]
    fn failed_page_serializes_label() {
        let failed = FailedPage {
            title: "Mercury".into(),
            error: FailureKind::Disambiguation,
        };
        let json = serde_json::to_string(&failed).expect("serialize");
        assert_eq!(json, r#"{"title":"Mercury","error":"DisambiguationError"}"#);

        let parsed: FailedPage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, failed);
    }

    #[test]
    fn export_row_tags_are_a_list_literal() {
        let entry = KbEntry {
            source: DEFAULT_SOURCE_LABEL.into(),
            source_id: "abc".into(),
            chunk_text: "text".into(),
            tags: vec!["Jupiter".into(), "Io".into()],
            reference_url: "https://en.wikipedia.org/wiki/Io".into(),
            enrichment_prompt: None,
        };
        let row = ExportRow::new(&entry, "rewritten".into());
        assert_eq!(row.tags, r#"["Jupiter","Io"]"#);
        assert_eq!(row.chunk_text, "rewritten");
        assert_eq!(row.tag_list(), vec!["Jupiter", "Io"]);
    }
}
