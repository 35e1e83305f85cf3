//! Reference page source.
//!
//! This crate provides:
//! - [`PageSource`]: keyword search and full-page fetch over a wiki
//! - [`WikipediaClient`]: the MediaWiki Action API implementation
//! - [`is_disambiguation_title`]: the search-result title filter

mod wikipedia;

use async_trait::async_trait;

use coachkb_shared::{Result, SourcePage};

pub use wikipedia::WikipediaClient;

/// Marker that identifies disambiguation pages by title.
const DISAMBIGUATION_MARKER: &str = "(disambiguation)";

/// A searchable collection of reference pages.
///
/// `fetch_page` fails with [`coachkb_shared::CoachKbError::AmbiguousTitle`]
/// when the title resolves to a disambiguation page and with
/// [`coachkb_shared::CoachKbError::PageNotFound`] when no such page exists.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Return up to `limit` page titles matching `query`, best match first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    /// Fetch the full page for `title`.
    async fn fetch_page(&self, title: &str) -> Result<SourcePage>;
}

/// True when a search-result title names a disambiguation page.
pub fn is_disambiguation_title(title: &str) -> bool {
    title.contains(DISAMBIGUATION_MARKER)
}
