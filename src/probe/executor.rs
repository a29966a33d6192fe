//! Bounded concurrency executor.
//!
//! Runs the probe worker over every candidate with at most
//! `min(max_workers, candidates)` probes in flight, and returns only once
//! every submitted probe has completed. Outcomes come back in completion
//! order.

use crate::probe::types::ProbeOutcome;
use crate::probe::worker::{CheckTransport, ProbeWorker};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default ceiling on simultaneously running probes.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Fixed-size pool that fans candidates out to a [`ProbeWorker`].
pub struct Executor<T> {
    worker: Arc<ProbeWorker<T>>,
    max_workers: usize,
}

impl<T: CheckTransport> Executor<T> {
    /// Create an executor with at most `max_workers` probes in flight.
    pub fn new(worker: ProbeWorker<T>, max_workers: usize) -> Self {
        Self {
            worker: Arc::new(worker),
            max_workers: max_workers.max(1),
        }
    }

    /// The worker shared by every task.
    #[must_use]
    pub fn worker(&self) -> &ProbeWorker<T> {
        &self.worker
    }

    /// Number of probes allowed to run at once for `total` candidates.
    #[must_use]
    pub fn concurrency_for(&self, total: usize) -> usize {
        self.max_workers.min(total).max(1)
    }

    /// Probe every candidate line.
    ///
    /// `on_progress(done, total)` is called once per completed probe, with
    /// `done` strictly increasing. A probe task that panics is isolated:
    /// its candidate gets a failed outcome and the rest of the batch runs on.
    pub async fn run_all<F>(&self, candidates: Vec<String>, mut on_progress: F) -> Vec<ProbeOutcome>
    where
        F: FnMut(usize, usize),
    {
        let total = candidates.len();
        if total == 0 {
            return Vec::new();
        }

        let permits = self.concurrency_for(total);
        tracing::info!("probing {total} candidates with {permits} workers");
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut pending = FuturesUnordered::new();

        for line in candidates {
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(&semaphore);
            let task_line = line.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return worker
                        .record(ProbeOutcome::internal_fault(&task_line, "worker pool closed"))
                        .await;
                };
                worker.probe(&task_line).await
            });
            pending.push(handle.map(move |joined| (line, joined)));
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some((line, joined)) = pending.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("probe for `{line}` aborted: {e}");
                    self.worker
                        .record(ProbeOutcome::internal_fault(line.trim(), e))
                        .await
                }
            };
            outcomes.push(outcome);
            on_progress(outcomes.len(), total);
        }

        outcomes
    }
}
