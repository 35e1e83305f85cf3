//! Page chunking: overlapping word windows plus one entry per image.

use coachkb_shared::{CoachKbError, KbEntry, PageRecord, Prompts, Result};
use coachkb_storage::DedupStore;

/// Window settings for [`build_entries`].
#[derive(Debug, Clone)]
pub struct ChunkOptions {
    /// Words per window.
    pub chunk_size: usize,
    /// Words shared by consecutive windows.
    pub overlap: usize,
    /// Attach the text-context prompt to text windows as well as images.
    pub enrich_text_chunks: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            overlap: 10,
            enrich_text_chunks: false,
        }
    }
}

/// Split `content` on whitespace into windows of `chunk_size` words, each
/// starting `chunk_size - overlap` words after the previous one.
///
/// The last window may be shorter. A window that would lie entirely inside
/// its predecessor is not produced, so content of at most `chunk_size` words
/// yields exactly one window (empty content yields one empty window).
pub fn chunk_words(content: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(CoachKbError::validation(format!(
            "invalid chunking: size {chunk_size}, overlap {overlap}"
        )));
    }

    let words: Vec<&str> = content.split_whitespace().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Turn every stored page into knowledge-base entries.
///
/// Pages keep store order; within a page, text windows precede image entries.
pub fn build_entries(
    store: &DedupStore,
    source_label: &str,
    options: &ChunkOptions,
    prompts: &Prompts,
) -> Result<Vec<KbEntry>> {
    let mut entries = Vec::new();

    for (hash, page) in store.iter() {
        let text_prompt = options
            .enrich_text_chunks
            .then(|| context_prompt(&prompts.text_context, page));

        for chunk in chunk_words(&page.content, options.chunk_size, options.overlap)? {
            entries.push(entry(source_label, hash, page, chunk, text_prompt.clone()));
        }

        let image_prompt = context_prompt(&prompts.image_description, page);
        for image in &page.images {
            entries.push(entry(
                source_label,
                hash,
                page,
                image.clone(),
                Some(image_prompt.clone()),
            ));
        }
    }

    Ok(entries)
}

fn context_prompt(instruction: &str, page: &PageRecord) -> String {
    format!("{instruction} {}", page.summary)
}

fn entry(
    source_label: &str,
    hash: &str,
    page: &PageRecord,
    chunk_text: String,
    enrichment_prompt: Option<String>,
) -> KbEntry {
    KbEntry {
        source: source_label.to_string(),
        source_id: hash.to_string(),
        chunk_text,
        tags: page.tags.clone(),
        reference_url: page.url.clone(),
        enrichment_prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn expected_count(n: usize) -> usize {
        n.saturating_sub(10).max(1).div_ceil(190)
    }

    fn page(content: String, images: &[&str]) -> PageRecord {
        PageRecord {
            content,
            summary: "A gas giant.".into(),
            images: images.iter().map(|s| s.to_string()).collect(),
            url: "https://en.wikipedia.org/wiki/Jupiter".into(),
            tags: vec!["Jupiter".into()],
        }
    }

    #[test]
    fn short_content_is_one_chunk_equal_to_content() {
        let content = words(200);
        let chunks = chunk_words(&content, 200, 10).unwrap();
        assert_eq!(chunks, vec![content]);

        let chunks = chunk_words("Jupiter\n  is   big", 200, 10).unwrap();
        assert_eq!(chunks, vec!["Jupiter is big"]);
    }

    #[test]
    fn two_hundred_fifty_words_make_two_overlapping_chunks() {
        let chunks = chunk_words(&words(250), 200, 10).unwrap();
        assert_eq!(chunks.len(), 2);

        let first: Vec<&str> = chunks[0].split(' ').collect();
        let second: Vec<&str> = chunks[1].split(' ').collect();
        assert_eq!(first.len(), 200);
        assert_eq!((first[0], first[199]), ("w0", "w199"));
        assert_eq!(second.len(), 60);
        assert_eq!((second[0], second[59]), ("w190", "w249"));
    }

    #[test]
    fn chunk_count_matches_formula() {
        for n in [0, 1, 199, 200, 201, 210, 211, 390, 391, 580, 581, 1000, 5003] {
            let chunks = chunk_words(&words(n), 200, 10).unwrap();
            assert_eq!(chunks.len(), expected_count(n), "n = {n}");
        }
    }

    #[test]
    fn invalid_window_settings_are_rejected() {
        assert!(chunk_words("a b", 0, 0).is_err());
        assert!(chunk_words("a b", 10, 10).is_err());
    }

    #[test]
    fn entries_put_text_before_images() {
        let mut store = DedupStore::new();
        store.insert("h1".into(), page(words(250), &["https://u/a.jpg", "https://u/b.png"]));
        store.insert("h2".into(), page(words(5), &[]));

        let entries =
            build_entries(&store, "Wikipedia", &ChunkOptions::default(), &Prompts::default())
                .unwrap();

        assert_eq!(entries.len(), 2 + 2 + 1);
        assert!(entries[..2].iter().all(|e| e.enrichment_prompt.is_none()));
        assert_eq!(entries[2].chunk_text, "https://u/a.jpg");
        assert_eq!(entries[3].chunk_text, "https://u/b.png");
        assert_eq!(entries[4].source_id, "h2");

        let prompt = entries[2].enrichment_prompt.as_deref().unwrap();
        assert!(prompt.starts_with(&Prompts::default().image_description));
        assert!(prompt.ends_with("A gas giant."));
        assert_eq!(entries[2].tags, vec!["Jupiter"]);
        assert_eq!(entries[2].source, "Wikipedia");
    }

    #[test]
    fn text_enrichment_is_opt_in() {
        let mut store = DedupStore::new();
        store.insert("h1".into(), page(words(20), &[]));
        let options = ChunkOptions {
            enrich_text_chunks: true,
            ..ChunkOptions::default()
        };

        let entries = build_entries(&store, "Wikipedia", &options, &Prompts::default()).unwrap();
        let prompt = entries[0].enrichment_prompt.as_deref().unwrap();
        assert!(prompt.starts_with(&Prompts::default().text_context));
    }
}
