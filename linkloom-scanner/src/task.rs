//! Per-page crawl task.
//!
//! A task claims its page in the dedup map, fetches it, classifies every
//! link attribute and queues pages nobody has claimed yet. The work races
//! the global shutdown token and the per-page crawl timeout; whichever
//! finishes first decides the outcome and the rest is dropped. Successful
//! pages are handed to the graph sink and are not touched again.

use crate::classify::{LinkClass, classify};
use crate::dedup::DedupMap;
use crate::error::{Result, ScanError};
use crate::fetch::Fetcher;
use crate::markup::extract_link_attrs;
use crate::page::Page;
use crate::queue::WorkQueue;
use crate::stats::{CrawlCounters, CrawlOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

/// Channel feeding completed pages to the graph recorder.
pub type PageSink = mpsc::Sender<Page>;

#[derive(Debug, Clone, Copy)]
pub struct TaskSettings {
    /// Upper bound on fetching and processing one page.
    pub crawl_timeout: Duration,
    /// Number of re-attempts allowed after a failed fetch.
    pub max_fetch_fail: u32,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            crawl_timeout: Duration::from_secs(10),
            max_fetch_fail: 2,
        }
    }
}

/// Everything a crawl task shares with its siblings.
pub struct CrawlContext {
    pub dedup: DedupMap,
    pub fetcher: Arc<dyn Fetcher>,
    pub queue: WorkQueue,
    pub sink: Option<PageSink>,
    pub counters: Arc<CrawlCounters>,
    pub settings: TaskSettings,
}

enum PageResult {
    Done(Page),
    FetchFailed,
    BadLink(ScanError),
    Interrupted,
}

/// Runs one page to a terminal outcome and records it in the counters.
pub async fn crawl_page(
    ctx: Arc<CrawlContext>,
    page: Page,
    cancel: CancellationToken,
) -> CrawlOutcome {
    let url = page.url().clone();

    match claim(&ctx, &page).await {
        Ok(true) => {}
        Ok(false) => {
            debug!("Possible duplicate addition {}", url);
            return CrawlOutcome::Duplicate;
        }
        Err(e) => {
            debug!("Could not claim {}: {}", url, e);
            ctx.counters.record(CrawlOutcome::Cancelled);
            return CrawlOutcome::Cancelled;
        }
    }

    info!("Processing page {}", url);

    let scope = cancel.child_token();
    let _scope_guard = scope.clone().drop_guard();

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("Cancelling crawling the page {}", url);
            CrawlOutcome::Cancelled
        }
        result = process_page(&ctx, page, scope.clone()) => match result {
            PageResult::Done(page) => {
                info!(
                    "Successfully crawled {} ({} links, {} assets)",
                    url,
                    page.out_links().len(),
                    page.statics().len()
                );
                if let Some(sink) = &ctx.sink
                    && sink.send(page).await.is_err()
                {
                    debug!("Graph recorder gone, dropping {}", url);
                }
                CrawlOutcome::Succeeded
            }
            PageResult::FetchFailed => CrawlOutcome::Failed,
            PageResult::BadLink(e) => {
                info!("Skipping this - {} - page, probably bad: {}", url, e);
                CrawlOutcome::Failed
            }
            PageResult::Interrupted => CrawlOutcome::Cancelled,
        },
        _ = tokio::time::sleep(ctx.settings.crawl_timeout) => {
            info!(
                "This page {} is taking too long (> {:?}), skipping it!",
                url, ctx.settings.crawl_timeout
            );
            CrawlOutcome::Skipped
        }
    };

    ctx.counters.record(outcome);
    outcome
}

/// Claims the page's key. A page coming back for a retry already owns its
/// key, which is recognised by identity rather than by a second insert.
async fn claim(ctx: &CrawlContext, page: &Page) -> Result<bool> {
    if ctx.dedup.add(page.url().as_str(), page.id().clone()).await? {
        return Ok(true);
    }
    if page.fail_count() == 0 {
        return Ok(false);
    }
    let owner = ctx.dedup.exists(page.url().as_str()).await?;
    Ok(owner.is_some_and(|owner| Arc::ptr_eq(&owner, page.id())))
}

async fn process_page(ctx: &CrawlContext, mut page: Page, scope: CancellationToken) -> PageResult {
    if scope.is_cancelled() {
        return PageResult::Interrupted;
    }

    let body = match ctx.fetcher.fetch(page.url()).await {
        Ok(body) => body,
        Err(e) => {
            let failures = page.record_failure();
            info!("Failed to crawl {}: {}", page.url(), e);
            if failures <= ctx.settings.max_fetch_fail {
                debug!(
                    "Re-queueing {} (failure {} of {} tolerated)",
                    page.url(),
                    failures,
                    ctx.settings.max_fetch_fail
                );
                ctx.queue.offer(page).await;
            } else {
                warn!("Giving up on {} after {} failed fetches", page.url(), failures);
            }
            return PageResult::FetchFailed;
        }
    };

    for attr in extract_link_attrs(&body) {
        if scope.is_cancelled() {
            info!("Cancelling further processing of {}", page.url());
            return PageResult::Interrupted;
        }

        let class = match classify(&attr.value, page.url()) {
            Ok(class) => class,
            Err(e) => return PageResult::BadLink(e),
        };

        match class {
            LinkClass::Static(asset) => page.add_static(asset),
            LinkClass::SamePage(target) => {
                if let Err(e) = link_same_page(ctx, &mut page, target).await {
                    debug!("Stopping {} early: {}", page.url(), e);
                    return PageResult::Interrupted;
                }
            }
            LinkClass::Skip => trace!("Ignoring <{} {}={:?}>", attr.tag, attr.attribute, attr.value),
        }
    }

    PageResult::Done(page)
}

async fn link_same_page(ctx: &CrawlContext, page: &mut Page, target: Url) -> Result<()> {
    if page.bump_link(target.as_str()) {
        return Ok(());
    }

    match ctx.dedup.exists(target.as_str()).await? {
        Some(existing) => page.link_to(existing),
        None => {
            let discovered = Page::new(target);
            page.link_to(discovered.id().clone());
            trace!("Discovered {}", discovered.url());
            ctx.queue.offer(discovered).await;
        }
    }
    Ok(())
}
