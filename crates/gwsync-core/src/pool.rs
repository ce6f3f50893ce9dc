//! Bounded worker pool used by the pollers to fan out per-item handling.

use futures::future::Future;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Fixed-size pool of handler slots.
///
/// At most `workers` handlers run at once. The next item is only pulled from
/// the listing once a slot frees up, and [`WorkerPool::run`] returns after
/// every handler has finished.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Upper bound on configurable workers.
    pub const MAX_WORKERS: usize = 256;

    /// Create a pool, clamping `workers` to `1..=MAX_WORKERS`.
    pub const fn new(workers: usize) -> Self {
        let workers = if workers == 0 {
            1
        } else if workers > Self::MAX_WORKERS {
            Self::MAX_WORKERS
        } else {
            workers
        };
        Self { workers }
    }

    /// Number of handler slots.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Run `handler` for every item and wait for all of them.
    ///
    /// Returns the number of handlers that ran.
    pub async fn run<I, F, Fut>(&self, items: I, handler: F) -> usize
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = ()>,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let handler = &handler;

        stream::iter(items)
            .map(|item| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore.acquire().await;
                    handler(item).await;
                }
            })
            .buffer_unordered(self.workers)
            .fold(0usize, |done, ()| async move { done + 1 })
            .await
    }
}
