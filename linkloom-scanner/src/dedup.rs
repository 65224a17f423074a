//! Deduplication map.
//!
//! A single task owns the key → page map and answers requests sent over a
//! bounded channel, so every `add` and `exists` is serialized without a
//! lock. The loop stops when its cancellation token fires; requests made
//! afterwards fail with [`ScanError::StoreClosed`].

use crate::error::{Result, ScanError};
use crate::page::{PageRef, dedup_key};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default request buffer for the map's loop.
pub const DEDUP_CAPACITY: usize = 100;

enum Request {
    Add {
        key: String,
        page: PageRef,
        reply: oneshot::Sender<bool>,
    },
    Exists {
        key: String,
        reply: oneshot::Sender<Option<PageRef>>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the map's owning task.
#[derive(Clone)]
pub struct DedupMap {
    tx: mpsc::Sender<Request>,
}

impl DedupMap {
    /// Spawns the owning loop and returns a handle plus the loop's join handle.
    pub fn spawn(capacity: usize, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_loop(rx, shutdown));
        (Self { tx }, handle)
    }

    /// Inserts `page` under `key` unless the key is taken. Keys are
    /// scheme-stripped first. Exactly one concurrent caller per key gets
    /// `true`.
    pub async fn add(&self, key: &str, page: PageRef) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        let request = Request::Add {
            key: dedup_key(key),
            page,
            reply,
        };
        self.tx.send(request).await.map_err(|_| ScanError::StoreClosed)?;
        rx.await.map_err(|_| ScanError::StoreClosed)
    }

    /// Returns the page that won `key`, if any.
    pub async fn exists(&self, key: &str) -> Result<Option<PageRef>> {
        let (reply, rx) = oneshot::channel();
        let request = Request::Exists {
            key: dedup_key(key),
            reply,
        };
        self.tx.send(request).await.map_err(|_| ScanError::StoreClosed)?;
        rx.await.map_err(|_| ScanError::StoreClosed)
    }

    /// Number of claimed keys.
    pub async fn len(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Len { reply })
            .await
            .map_err(|_| ScanError::StoreClosed)?;
        rx.await.map_err(|_| ScanError::StoreClosed)
    }
}

async fn run_loop(mut rx: mpsc::Receiver<Request>, shutdown: CancellationToken) {
    let mut pages: HashMap<String, PageRef> = HashMap::new();
    debug!("Dedup map loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            request = rx.recv() => {
                let Some(request) = request else { break };
                match request {
                    Request::Add { key, page, reply } => {
                        let inserted = if pages.contains_key(&key) {
                            debug!("Key {} already claimed", key);
                            false
                        } else {
                            pages.insert(key, page);
                            true
                        };
                        let _ = reply.send(inserted);
                    }
                    Request::Exists { key, reply } => {
                        let _ = reply.send(pages.get(&key).cloned());
                    }
                    Request::Len { reply } => {
                        let _ = reply.send(pages.len());
                    }
                }
            }
        }
    }

    debug!("Dedup map loop exiting with {} keys", pages.len());
}
