//! Fixed-size worker pool that stops at the first failure.

use super::info::IngestItem;
use super::progress::ProgressReporter;
use super::IngestError;
use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of concurrent workers (at least 1)
    pub workers: usize,
}

impl PoolConfig {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(default_workers())
    }
}

/// Available parallelism, or 1 when it cannot be determined.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Lifecycle of a pool run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// No run started yet
    Idle,
    /// Items are being handed to workers
    Running,
    /// All items handed out; waiting for workers to finish
    Draining,
    /// Last run stopped at a failure
    Failed,
    /// Last run processed every item
    Terminated,
}

/// Runs a worker function over items with a fixed number of workers.
///
/// Items are handed out one at a time to whichever worker is free. A
/// failing item does not stop its worker: the error is reported and the
/// worker moves on. The dispatcher checks for reported errors between
/// hand-offs and stops at the first one it sees. Workers then finish the
/// item they hold, discard its result and exit, and that error is returned.
pub struct WorkerPool {
    config: PoolConfig,
    state: Arc<Mutex<PoolState>>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(PoolState::Idle)),
        }
    }

    pub fn workers(&self) -> usize {
        self.config.workers
    }

    pub fn state(&self) -> PoolState {
        *self.state.lock()
    }

    fn set_state(&self, state: PoolState) {
        *self.state.lock() = state;
        debug!(?state, "Pool state changed");
    }

    /// Processes every item with `worker`.
    ///
    /// `worker` runs on the blocking thread pool. Progress is reported only
    /// for items that completed before the run was stopped. Item failures
    /// reported after the last hand-off do not fail the run; a panicking
    /// worker always does.
    pub async fn execute<I, W, E, P>(
        &self,
        items: Vec<I>,
        worker: W,
        progress: Arc<P>,
    ) -> Result<(), IngestError>
    where
        I: IngestItem,
        W: Fn(&I) -> Result<(), E> + Send + Sync + 'static,
        E: Display + Send + 'static,
        P: ProgressReporter,
    {
        let total_items = items.len();
        let total_bytes: u64 = items.iter().map(|item| item.size()).sum();
        let worker = Arc::new(worker);
        let stop = CancellationToken::new();

        // Rendezvous-style intake: a send completes only once a worker is
        // ready for the next item.
        let (item_tx, item_rx) = mpsc::channel::<I>(1);
        let item_rx = Arc::new(tokio::sync::Mutex::new(item_rx));
        // At most one error per item, so reporting never blocks a worker
        let (err_tx, mut err_rx) = mpsc::channel::<IngestError>(total_items.max(1));

        self.set_state(PoolState::Running);
        info!(items = total_items, total_bytes, workers = self.config.workers, "Starting worker pool");
        progress.start_progress(total_bytes);

        let mut handles = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            handles.push(tokio::spawn(run_worker(
                id,
                Arc::clone(&item_rx),
                Arc::clone(&worker),
                err_tx.clone(),
                stop.clone(),
                Arc::clone(&progress),
            )));
        }
        drop(err_tx);

        let mut first_error = None;
        for item in items {
            if let Ok(err) = err_rx.try_recv() {
                first_error = Some(err);
                break;
            }
            if item_tx.send(item).await.is_err() {
                break;
            }
        }
        if first_error.is_some() {
            stop.cancel();
        }
        drop(item_tx);

        self.set_state(PoolState::Draining);
        for handle in handles {
            if let Err(err) = handle.await {
                first_error.get_or_insert(IngestError::Worker(err.to_string()));
            }
        }

        if first_error.is_none() {
            while let Ok(err) = err_rx.try_recv() {
                match err {
                    IngestError::Worker(_) => {
                        first_error.get_or_insert(err);
                    }
                    other => warn!(error = %other, "Item failed after the last hand-off"),
                }
            }
        }

        match first_error {
            Some(err) => {
                self.set_state(PoolState::Failed);
                warn!(error = %err, "Worker pool stopped");
                Err(err)
            }
            None => {
                progress.end_progress();
                progress.print_total_duration();
                self.set_state(PoolState::Terminated);
                info!(items = total_items, "Worker pool finished");
                Ok(())
            }
        }
    }
}

async fn run_worker<I, W, E, P>(
    id: usize,
    intake: Arc<tokio::sync::Mutex<mpsc::Receiver<I>>>,
    worker: Arc<W>,
    errors: mpsc::Sender<IngestError>,
    stop: CancellationToken,
    progress: Arc<P>,
) where
    I: IngestItem,
    W: Fn(&I) -> Result<(), E> + Send + Sync + 'static,
    E: Display + Send + 'static,
    P: ProgressReporter,
{
    loop {
        let next = {
            let mut intake = intake.lock().await;
            tokio::select! {
                // items still queued once the run stops are abandoned
                biased;
                _ = stop.cancelled() => None,
                item = intake.recv() => item,
            }
        };
        let Some(item) = next else { break };

        let size = item.size();
        let name = item.name();
        let work = Arc::clone(&worker);
        let outcome = tokio::task::spawn_blocking(move || {
            work(&item).map_err(|err| IngestError::Item {
                item: item.name(),
                message: err.to_string(),
            })
        })
        .await
        .unwrap_or_else(|join| Err(IngestError::Worker(join.to_string())));

        match outcome {
            Ok(()) if stop.is_cancelled() => {
                debug!(worker = id, item = %name, "Discarding result of stopped run");
            }
            Ok(()) => progress.update_progress(size),
            Err(err) => {
                debug!(worker = id, item = %name, error = %err, "Item failed");
                // sized for one error per item
                let _ = errors.try_send(err);
            }
        }
    }
    debug!(worker = id, "Worker exiting");
}
