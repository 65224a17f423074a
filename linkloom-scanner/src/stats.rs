use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Terminal outcome of one crawl task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    Succeeded,
    Failed,
    /// The per-page crawl timeout fired first.
    Skipped,
    Cancelled,
    /// Another task already owns the URL. Not counted.
    Duplicate,
}

/// Process-wide outcome counters. Relaxed ordering is enough: they are
/// informational and only read for progress and the final summary.
#[derive(Debug, Default)]
pub struct CrawlCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    cancelled: AtomicU64,
}

impl CrawlCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: CrawlOutcome) {
        let counter = match outcome {
            CrawlOutcome::Succeeded => &self.succeeded,
            CrawlOutcome::Failed => &self.failed,
            CrawlOutcome::Skipped => &self.skipped,
            CrawlOutcome::Cancelled => &self.cancelled,
            CrawlOutcome::Duplicate => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CrawlStats {
        CrawlStats {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub cancelled: u64,
}

impl CrawlStats {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed + self.skipped + self.cancelled
    }
}
