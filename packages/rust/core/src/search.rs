//! Knowledge search over the exported knowledge base.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use coachkb_shared::{ExportRow, Result, SearchHit};
use coachkb_storage::read_export;

/// Hits returned per query unless the caller asks otherwise.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Shortest query token that takes part in scoring.
const MIN_TOKEN_LEN: usize = 3;

/// Ranked retrieval of knowledge-base chunks.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// In-memory keyword-overlap index over export rows.
pub struct ExportIndex {
    rows: Vec<ExportRow>,
}

impl ExportIndex {
    /// Load the export file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let rows = read_export(path)?;
        debug!(rows = rows.len(), path = %path.display(), "export index loaded");
        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<ExportRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Score every row and keep the best `limit`, ties in export order.
    pub fn rank(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let tokens = tokenize_query(query);
        if tokens.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                let haystack = format!("{} {}", row.chunk_text, row.tags);
                let score = keyword_overlap(&tokens, &haystack);
                (score > 0.0).then_some((idx, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(limit)
            .map(|(idx, score)| {
                let row = &self.rows[idx];
                SearchHit {
                    chunk_text: row.chunk_text.clone(),
                    tags: row.tag_list(),
                    reference_url: row.reference_url.clone(),
                    score,
                }
            })
            .collect()
    }
}

#[async_trait]
impl KnowledgeSearch for ExportIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self.rank(query, limit))
    }
}

/// Lowercased, de-duplicated alphanumeric tokens of at least three characters.
fn tokenize_query(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|tok| tok.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .filter(|tok| seen.insert(tok.clone()))
        .collect()
}

/// Fraction of `tokens` that occur in `text`.
fn keyword_overlap(tokens: &[String], text: &str) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let haystack = text.to_lowercase();
    let hits = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    hits as f64 / tokens.len() as f64
}
