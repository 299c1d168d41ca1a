//! The bounded worker pool of spec.md §5: every CPU-bound or blocking core
//! operation (workbook reads, bulk tokenization/BM25 scoring, embedding
//! encode calls, vector index search/persist, generation, interaction-log
//! appends) is dispatched here so the HTTP edge's request-ingress task stays
//! responsive. Grounded on `probelabs-probe/lsp-daemon/src/pool.rs`'s
//! `Semaphore`-gated pool shape, sized down to the fixed worker count the
//! spec calls for instead of that pool's grow/shrink policy.
//!
//! The pool is fixed for the process lifetime: it hands out at most
//! [`WorkerPool::CAPACITY`] concurrent slots, and [`WorkerPool::shutdown`]
//! waits for every in-flight task to finish before the process exits.

use std::sync::Arc;

use tokio::sync::Semaphore;

/// A fixed-size gate around blocking/CPU-bound work, per spec.md §5.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    /// Fixed worker count for the process lifetime, per spec.md §5.
    pub const CAPACITY: usize = 2;

    pub fn new() -> Self {
        WorkerPool {
            semaphore: Arc::new(Semaphore::new(Self::CAPACITY)),
        }
    }

    /// Run a blocking closure on the pool, bounded by [`Self::CAPACITY`]
    /// concurrent slots. Used for workbook reads, index persistence, and
    /// bulk tokenization/BM25 scoring.
    pub async fn run_blocking<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore never closes while the pool is alive");
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .expect("worker pool task panicked")
    }

    /// Run an async future on the pool, bounded the same way. Used for
    /// embedding encode calls and generation, which are async I/O against
    /// a local model/server rather than CPU-bound closures.
    pub async fn run_async<F, T>(&self, fut: F) -> T
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore never closes while the pool is alive");
        tokio::spawn(async move {
            let _permit = permit;
            fut.await
        })
        .await
        .expect("worker pool task panicked")
    }

    /// Wait for every in-flight task to finish, per spec.md §5 ("the pool
    /// is fixed for the process lifetime and drained on shutdown"), by
    /// acquiring every permit: this resolves only once all outstanding
    /// `run_blocking`/`run_async` calls have released theirs, and the
    /// semaphore's own FIFO queuing means no task that starts waiting for
    /// a permit after shutdown begins can jump ahead of it.
    pub async fn shutdown(&self) {
        let _ = self.semaphore.acquire_many(Self::CAPACITY as u32).await;
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}
