//! Keyword list and transcript parsing.
//!
//! - Keyword lists are comma-separated model replies: `Jupiter, Io ,Europa`
//! - Transcripts are JSON arrays of `{start, end, text}` captions

use std::path::Path;

use coachkb_shared::{CoachKbError, Result, TranscriptSegment};

/// Split a comma-separated reply into trimmed, de-duplicated keywords.
///
/// Order of first appearance is kept; empty pieces and surrounding quotes are dropped.
pub fn parse_keyword_list(text: &str) -> Vec<String> {
    normalize_keywords(text.split(','))
}

/// Trim and de-duplicate keywords, keeping the first occurrence of each.
pub fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = Vec::new();
    for raw in keywords {
        let keyword = raw
            .as_ref()
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim();
        if keyword.is_empty() || seen.iter().any(|k: &String| k.as_str() == keyword) {
            continue;
        }
        seen.push(keyword.to_string());
    }
    seen
}

/// Load a normalized transcript from a JSON file.
pub fn load_transcript(path: &Path) -> Result<Vec<TranscriptSegment>> {
    let content = std::fs::read_to_string(path).map_err(|e| CoachKbError::io(path, e))?;
    parse_transcript(&content)
        .map_err(|e| CoachKbError::parse(format!("{}: {e}", path.display())))
}

/// Parse a transcript from its JSON representation.
pub fn parse_transcript(json: &str) -> Result<Vec<TranscriptSegment>> {
    let segments: Vec<TranscriptSegment> = serde_json::from_str(json)
        .map_err(|e| CoachKbError::parse(format!("invalid transcript JSON: {e}")))?;

    if let Some(bad) = segments.iter().find(|s| s.end < s.start) {
        return Err(CoachKbError::validation(format!(
            "transcript segment ends before it starts ({} > {})",
            bad.start, bad.end
        )));
    }

    Ok(segments)
}
