//! Search, fetch, dedup and tag: builds the raw page map.
//!
//! Keywords are processed one at a time in the given order, and the titles of
//! each search in result order. The store is only ever touched from here.

use tracing::{debug, error, info, instrument, warn};

use coachkb_crawler::{PageSource, is_disambiguation_title};
use coachkb_llm::LlmClient;
use coachkb_shared::{FailedPage, FailureKind, PageRecord, Result, SourcePage};
use coachkb_storage::DedupStore;

use crate::pipeline::ProgressReporter;
use crate::tagger;

/// What [`collect_pages`] needs besides the store.
pub struct CollectRequest<'a> {
    pub keywords: &'a [String],
    pub results_per_search: usize,
    pub selector_prompt: &'a str,
}

/// Fill `store` with one tagged record per distinct page found for `keywords`.
///
/// Pages that cannot be resolved are returned as [`FailedPage`]s and never
/// reach the store. A failed search aborts collection: the caller must not
/// checkpoint a store that is missing whole keywords.
#[instrument(skip_all, fields(keywords = request.keywords.len()))]
pub async fn collect_pages(
    source: &dyn PageSource,
    llm: &dyn LlmClient,
    request: &CollectRequest<'_>,
    store: &mut DedupStore,
    progress: &dyn ProgressReporter,
) -> Result<Vec<FailedPage>> {
    let mut failed = Vec::new();
    let total = request.keywords.len();

    for (i, keyword) in request.keywords.iter().enumerate() {
        progress.keyword_started(keyword, i + 1, total);

        let titles = source
            .search(keyword, request.results_per_search)
            .await
            .inspect_err(|e| error!(%keyword, error = %e, "search failed"))?;
        info!(%keyword, results = titles.len(), "searched");

        for title in titles.iter().filter(|t| !is_disambiguation_title(t)) {
            let page = match source.fetch_page(title).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(%title, error = %e, "page skipped");
                    failed.push(FailedPage {
                        title: title.clone(),
                        error: FailureKind::from(&e),
                    });
                    continue;
                }
            };

            if let Err(e) = add_page(llm, request, store, page).await {
                warn!(%title, error = %e, "page could not be recorded");
                failed.push(FailedPage {
                    title: title.clone(),
                    error: FailureKind::Other(e.to_string()),
                });
            }
        }
    }

    info!(pages = store.len(), failed = failed.len(), "collection finished");
    Ok(failed)
}

/// Tag and insert a fetched page unless its content is already stored.
async fn add_page(
    llm: &dyn LlmClient,
    request: &CollectRequest<'_>,
    store: &mut DedupStore,
    page: SourcePage,
) -> Result<()> {
    let hash = page.content_hash();
    if store.contains(&hash) {
        debug!(title = %page.title, %hash, "duplicate content, already stored");
        return Ok(());
    }

    let tags =
        tagger::tag_page(llm, request.selector_prompt, request.keywords, &page.summary).await?;
    info!(title = %page.title, ?tags, "page stored");
    store.insert(hash, PageRecord::from_source(page, tags));
    Ok(())
}
