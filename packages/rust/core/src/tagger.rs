//! Page tagging: pick the run keywords that describe a page.

use tracing::{debug, warn};

use coachkb_llm::LlmClient;
use coachkb_shared::Result;

/// User prompt for the keyword-selector call.
pub fn tagging_prompt(keywords: &[String], summary: &str) -> String {
    format!(
        "<available-keywords>\n{}\n</available-keywords>\n\n<page-summary>\n{}\n</page-summary>",
        keywords.join(","),
        summary
    )
}

/// Ask the model which of `keywords` apply to a page with `summary`.
///
/// The reply is split on commas. Only tags matching a run keyword survive
/// (case-insensitively, returned in the keyword's spelling), each once.
pub async fn tag_page(
    llm: &dyn LlmClient,
    system_prompt: &str,
    keywords: &[String],
    summary: &str,
) -> Result<Vec<String>> {
    let reply = llm
        .complete(system_prompt, &tagging_prompt(keywords, summary))
        .await?;

    let tags = filter_tags(&reply, keywords);
    debug!(?tags, "page tagged");
    Ok(tags)
}

/// Keep the reply tags that name a known keyword.
pub fn filter_tags(reply: &str, keywords: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut dropped: Vec<&str> = Vec::new();

    for raw in reply.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let wanted = raw.to_lowercase();
        match keywords.iter().find(|k| k.to_lowercase() == wanted) {
            Some(keyword) if !tags.contains(keyword) => tags.push(keyword.clone()),
            Some(_) => {}
            None => dropped.push(raw),
        }
    }

    if !dropped.is_empty() {
        warn!(?dropped, "tagger returned unknown keywords");
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLlm;

    fn keywords() -> Vec<String> {
        vec!["Jupiter".into(), "Great Red Spot".into(), "Io".into()]
    }

    #[test]
    fn prompt_wraps_keywords_and_summary() {
        let prompt = tagging_prompt(&keywords(), "A gas giant.");
        assert!(prompt.contains("<available-keywords>\nJupiter,Great Red Spot,Io\n</available-keywords>"));
        assert!(prompt.contains("<page-summary>\nA gas giant.\n</page-summary>"));
    }

    #[test]
    fn filter_keeps_known_keywords_in_canonical_spelling() {
        let tags = filter_tags(" jupiter, GREAT RED SPOT ,Saturn,,Jupiter", &keywords());
        assert_eq!(tags, vec!["Jupiter", "Great Red Spot"]);
    }

    #[test]
    fn filter_of_empty_reply_is_empty() {
        assert!(filter_tags("", &keywords()).is_empty());
    }

    #[tokio::test]
    async fn tag_page_uses_selector_prompt() {
        let llm = FakeLlm::new(|system, user| {
            assert_eq!(system, "select");
            assert!(user.contains("<page-summary>"));
            Ok("Io, Europa".into())
        });

        let tags = tag_page(&llm, "select", &keywords(), "A moon.").await.unwrap();
        assert_eq!(tags, vec!["Io"]);
        assert_eq!(llm.calls(), 1);
    }
}
