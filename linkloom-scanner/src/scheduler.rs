//! Crawl scheduler.
//!
//! Pulls pages off the work queue and spawns one task per page. The
//! `JoinSet` length is the in-flight count. The crawl is finished only when
//! reaping a task leaves nothing in flight and the queue is still empty; a
//! running task may refill the queue at any moment, so an empty queue alone
//! means nothing.

use crate::page::Page;
use crate::stats::CrawlOutcome;
use crate::task::{CrawlContext, crawl_page};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Why [`Scheduler::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    /// Every reachable page reached a terminal state.
    Completed,
    /// The shutdown token fired first.
    Cancelled,
}

pub struct Scheduler {
    ctx: Arc<CrawlContext>,
    rx: mpsc::Receiver<Page>,
    shutdown: CancellationToken,
    limiter: Option<Arc<Semaphore>>,
    tasks: JoinSet<CrawlOutcome>,
    launched: u64,
}

impl Scheduler {
    pub fn new(ctx: Arc<CrawlContext>, rx: mpsc::Receiver<Page>, shutdown: CancellationToken) -> Self {
        Self {
            ctx,
            rx,
            shutdown,
            limiter: None,
            tasks: JoinSet::new(),
            launched: 0,
        }
    }

    /// Caps the number of pages being fetched at once. `0` leaves the
    /// crawl unbounded.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.limiter = (max > 0).then(|| Arc::new(Semaphore::new(max)));
        self
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Number of tasks launched so far, retries included.
    pub fn launched(&self) -> u64 {
        self.launched
    }

    /// Runs until the frontier is exhausted or shutdown is requested.
    pub async fn run(&mut self) -> SchedulerExit {
        let mut first_launch = false;
        let mut queue_open = true;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Scheduler stopping with {} tasks in flight", self.tasks.len());
                    return SchedulerExit::Cancelled;
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    reap(joined);
                    if first_launch && self.tasks.is_empty() && self.rx.is_empty() {
                        info!("Crawl frontier exhausted after {} tasks", self.launched);
                        return SchedulerExit::Completed;
                    }
                }
                page = self.rx.recv(), if queue_open => match page {
                    Some(page) => {
                        self.launch(page);
                        first_launch = true;
                    }
                    None => {
                        debug!("Work queue closed");
                        queue_open = false;
                        if self.tasks.is_empty() {
                            return SchedulerExit::Completed;
                        }
                    }
                },
            }
        }
    }

    fn launch(&mut self, page: Page) {
        let ctx = self.ctx.clone();
        let cancel = self.shutdown.clone();
        let limiter = self.limiter.clone();
        self.launched += 1;
        trace!("Launching task {} for {}", self.launched, page.url());

        self.tasks.spawn(async move {
            let _permit = match limiter {
                Some(limiter) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        ctx.counters.record(CrawlOutcome::Cancelled);
                        return CrawlOutcome::Cancelled;
                    }
                    permit = limiter.acquire_owned() => permit.ok(),
                },
                None => None,
            };
            crawl_page(ctx, page, cancel).await
        });
    }

    /// Stops taking work and waits for every in-flight task to exit.
    /// Returns the number of tasks drained.
    pub async fn drain(&mut self) -> usize {
        self.rx.close();
        let abandoned = self.rx.len();
        if abandoned > 0 {
            debug!("Discarding {} queued pages", abandoned);
        }
        while self.rx.try_recv().is_ok() {}

        let mut drained = 0;
        while let Some(joined) = self.tasks.join_next().await {
            reap(joined);
            drained += 1;
        }
        drained
    }
}

fn reap(joined: Result<CrawlOutcome, JoinError>) {
    match joined {
        Ok(outcome) => trace!("Crawl task finished: {:?}", outcome),
        Err(e) => warn!("Crawl task aborted: {}", e),
    }
}
