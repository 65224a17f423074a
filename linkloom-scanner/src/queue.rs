use crate::page::Page;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Capacity of the work queue. Producers wait when it is full.
pub const QUEUE_CAPACITY: usize = 100;

/// Producer side of the work queue.
///
/// Sends are best effort: once the queue is closed or shutdown has begun,
/// pages are dropped silently. Losing discoveries during a drain is
/// expected and is not a crawl error.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<Page>,
    shutdown: CancellationToken,
}

impl WorkQueue {
    pub fn new(capacity: usize, shutdown: CancellationToken) -> (Self, mpsc::Receiver<Page>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, shutdown }, rx)
    }

    /// Enqueues `page`, returning whether it was accepted.
    pub async fn offer(&self, page: Page) -> bool {
        if self.shutdown.is_cancelled() {
            trace!("Dropping {} during shutdown", page.url());
            return false;
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            sent = self.tx.send(page) => match sent {
                Ok(()) => true,
                Err(mpsc::error::SendError(page)) => {
                    trace!("Queue closed, dropping {}", page.url());
                    false
                }
            },
        }
    }
}
