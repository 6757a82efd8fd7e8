//! Bounded-concurrency fan-out/fan-in
//!
//! A fixed set of workers pulls items from a shared queue, runs the worker
//! function and pushes successes onto an output channel. Failed items are
//! dropped (logged at debug). The coordinator drains the output channel until
//! every worker has exited, so the call never fails: it returns whatever subset
//! succeeded, in completion order.
//!
//! Cancelling the pool's token stops workers from taking new items and abandons
//! in-flight calls; results completed before that are still returned.

use rand::RngExt;
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Request-scoped worker pool
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    jitter: Option<Duration>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Pool running at most `concurrency` items at once (at least one)
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            jitter: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Delay every item by a random duration in `[base/2, base]` before its call
    #[must_use]
    pub fn with_jitter(mut self, base: Duration) -> Self {
        self.jitter = (!base.is_zero()).then_some(base);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `worker_fn` over all items and collect the successes
    pub async fn run<I, O, E, F, Fut>(&self, items: Vec<I>, worker_fn: F) -> Vec<O>
    where
        I: Send + 'static,
        O: Send + 'static,
        E: Display + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let worker_count = self.concurrency.min(total);
        let queue = Arc::new(Mutex::new(VecDeque::from(items)));
        let worker_fn = Arc::new(worker_fn);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();

        debug!("Starting {} worker(s) for {} item(s)", worker_count, total);

        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let worker_fn = Arc::clone(&worker_fn);
            let tx = tx.clone();
            let cancel = self.cancel.clone();
            let jitter = self.jitter;

            workers.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(item) = queue.lock().await.pop_front() else {
                        break;
                    };

                    if let Some(base) = jitter {
                        let delay = jitter_delay(base);
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }

                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        result = (*worker_fn)(item) => result,
                    };

                    match result {
                        Ok(output) => {
                            if tx.send(output).is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!("Worker {} dropped an item: {}", worker_id, e),
                    }
                }
            });
        }

        // Workers hold the only remaining senders; the channel closes when the last one exits.
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(output) = rx.recv().await {
            results.push(output);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Worker task failed: {}", e);
            }
        }

        if self.cancel.is_cancelled() {
            info!(
                "Worker pool cancelled: {} of {} item(s) completed",
                results.len(),
                total
            );
        } else {
            info!(
                "Worker pool finished: {} of {} item(s) succeeded",
                results.len(),
                total
            );
        }
        results
    }
}

/// Uniform random delay in `[base/2, base]`
fn jitter_delay(base: Duration) -> Duration {
    let factor: f64 = rand::rng().random_range(0.5..=1.0);
    base.mul_f64(factor)
}
