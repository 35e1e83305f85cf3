//! In-crate fakes for the LLM and page source collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use coachkb_crawler::PageSource;
use coachkb_llm::LlmClient;
use coachkb_shared::{CoachKbError, Result, SourcePage};

type Handler = Box<dyn Fn(&str, &str) -> Result<String> + Send + Sync>;

/// LLM that answers through a closure and counts calls.
pub struct FakeLlm {
    handler: Handler,
    calls: AtomicUsize,
}

impl FakeLlm {
    pub fn new(handler: impl Fn(&str, &str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
        }
    }

    /// Echo the user prompt back, prefixed.
    pub fn echo() -> Self {
        Self::new(|_, user| Ok(format!("enriched: {user}")))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(system_prompt, user_prompt)
    }
}

/// Scripted outcome of a page fetch.
#[derive(Clone)]
pub enum FakePage {
    Found(SourcePage),
    Ambiguous,
    Missing,
}

/// Page source backed by in-memory tables.
#[derive(Default)]
pub struct FakeSource {
    searches: HashMap<String, Vec<String>>,
    pages: HashMap<String, FakePage>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, query: &str, titles: &[&str]) -> Self {
        self.searches
            .insert(query.into(), titles.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_page(mut self, title: &str, page: FakePage) -> Self {
        self.pages.insert(title.into(), page);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for FakeSource {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.searches
            .get(query)
            .map(|titles| titles.iter().take(limit).cloned().collect())
            .ok_or_else(|| CoachKbError::Network(format!("no search scripted for {query}")))
    }

    async fn fetch_page(&self, title: &str) -> Result<SourcePage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(title) {
            Some(FakePage::Found(page)) => Ok(page.clone()),
            Some(FakePage::Ambiguous) => Err(CoachKbError::AmbiguousTitle {
                title: title.into(),
            }),
            Some(FakePage::Missing) | None => Err(CoachKbError::PageNotFound {
                title: title.into(),
            }),
        }
    }
}

/// A page whose body is `words` generated words.
pub fn source_page(title: &str, words: usize, images: &[&str]) -> SourcePage {
    SourcePage {
        title: title.into(),
        content: (0..words).map(|i| format!("{title}{i}")).collect::<Vec<_>>().join(" "),
        summary: format!("{title} summary."),
        images: images.iter().map(|s| s.to_string()).collect(),
        url: format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_")),
    }
}

/// A fresh, unique scratch directory.
pub fn temp_dir(label: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("coachkb-{label}-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
