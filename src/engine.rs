//! Pagination engine — drives a paginated source to completion with a
//! bounded pool of concurrent page fetches.
//!
//! The engine owns scheduling only. Everything source-specific lives behind
//! [`PageFetcher`]; everything report-specific happens downstream on the
//! returned [`RunResult`]. Per-page failures are isolated: a failed page
//! becomes a [`PageError`] and the run continues, so every scheduled page
//! index ends up in exactly one of records/errors.
//!
//! Record order across pages follows completion order. Callers needing page
//! order re-sort by the provenance fields the engine attaches to each record.

use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::types::{PageCount, PageError, PageId, RunResult};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

/// Hard upper bound on concurrent page fetches, regardless of configuration
pub const MAX_CONCURRENCY: usize = 32;

/// Safety cap on unknown-length sources that never produce an empty page
const MAX_UNBOUNDED_PAGES: u32 = 10_000;

/// Outcome of one page attempt, flowing from the fetch tasks to the collector
enum PageOutcome {
    /// Page fetched successfully; an empty vec signals exhaustion
    Fetched(PageId, Vec<crate::types::RawRecord>),
    /// Page failed; recorded, never fatal
    Failed(PageError),
    /// Page was not attempted (or abandoned) because the run was cancelled
    Skipped,
}

/// Drive every page of `fetcher` to completion
///
/// Runs up to `concurrency` page fetches at once (clamped into
/// `1..=`[`MAX_CONCURRENCY`]), invoking `progress` at the start of each page
/// attempt. Sources with a known total get one task per page index in
/// `[0, total)`; unknown-length sources are scheduled in waves and stop after
/// the first wave containing an empty page.
///
/// Cancelling `cancel` stops scheduling of not-yet-started pages and abandons
/// in-flight fetches at their next await point; outcomes collected up to that
/// point are returned as valid partial output.
pub async fn scrape<F, P>(
    fetcher: &F,
    concurrency: usize,
    progress: P,
    cancel: &CancellationToken,
) -> Result<RunResult>
where
    F: PageFetcher + ?Sized,
    P: Fn(PageId) + Sync,
{
    let clamped = concurrency.clamp(1, MAX_CONCURRENCY);
    if clamped != concurrency {
        tracing::warn!(
            requested = concurrency,
            effective = clamped,
            "clamping page-fetch concurrency"
        );
    }

    let mut result = RunResult::default();
    if cancel.is_cancelled() {
        return Ok(result);
    }

    match fetcher.page_count().await? {
        PageCount::Known(total) => {
            tracing::debug!(source = fetcher.name(), total, "scraping known page count");
            run_pages(
                fetcher,
                (0..total).map(PageId::new),
                clamped,
                &progress,
                cancel,
                &mut result,
            )
            .await;
        }
        PageCount::Unknown => {
            tracing::debug!(source = fetcher.name(), "scraping until first empty page");
            let mut next = 0u32;
            while !cancel.is_cancelled() && next < MAX_UNBOUNDED_PAGES {
                let end = next.saturating_add(clamped as u32).min(MAX_UNBOUNDED_PAGES);
                let saw_empty = run_pages(
                    fetcher,
                    (next..end).map(PageId::new),
                    clamped,
                    &progress,
                    cancel,
                    &mut result,
                )
                .await;
                if saw_empty {
                    break;
                }
                next = end;
            }
        }
    }

    tracing::debug!(
        source = fetcher.name(),
        records = result.records.len(),
        errors = result.errors.len(),
        "scrape finished"
    );
    Ok(result)
}

/// Fetch one batch of pages concurrently, folding outcomes into `result`
///
/// The `buffer_unordered` stream is the bounded worker pool; collecting it
/// on this task is the single collector, so appends need no extra
/// synchronization. Returns whether any page succeeded with zero records.
async fn run_pages<F, P>(
    fetcher: &F,
    pages: impl Iterator<Item = PageId>,
    concurrency: usize,
    progress: &P,
    cancel: &CancellationToken,
    result: &mut RunResult,
) -> bool
where
    F: PageFetcher + ?Sized,
    P: Fn(PageId) + Sync,
{
    let outcomes: Vec<PageOutcome> = stream::iter(pages)
        .map(|page| fetch_one(fetcher, page, progress, cancel))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut saw_empty = false;
    for outcome in outcomes {
        match outcome {
            PageOutcome::Fetched(page, records) => {
                if records.is_empty() {
                    saw_empty = true;
                }
                for mut record in records {
                    record.tag_provenance(fetcher.name(), page);
                    result.records.push(record);
                }
            }
            PageOutcome::Failed(error) => result.errors.push(error),
            PageOutcome::Skipped => {}
        }
    }
    saw_empty
}

async fn fetch_one<F, P>(
    fetcher: &F,
    page: PageId,
    progress: &P,
    cancel: &CancellationToken,
) -> PageOutcome
where
    F: PageFetcher + ?Sized,
    P: Fn(PageId) + Sync,
{
    if cancel.is_cancelled() {
        return PageOutcome::Skipped;
    }

    progress(page);

    tokio::select! {
        _ = cancel.cancelled() => PageOutcome::Skipped,
        fetched = fetcher.fetch_page(page) => match fetched {
            Ok(records) => PageOutcome::Fetched(page, records),
            Err(e) => {
                tracing::warn!(source = fetcher.name(), page = page.get(), error = %e, "page fetch failed");
                PageOutcome::Failed(PageError::new(page, e.to_string()))
            }
        }
    }
}
