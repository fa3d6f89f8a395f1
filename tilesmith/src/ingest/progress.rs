//! Progress reporting for ingest runs.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// Receives progress of an ingest run.
///
/// The pool calls `start_progress` once, `update_progress` once per item
/// completed successfully, and `end_progress` then `print_total_duration`
/// once when the whole run succeeded.
pub trait ProgressReporter: Send + Sync + 'static {
    fn start_progress(&self, total_bytes: u64);
    fn update_progress(&self, bytes: u64);
    fn end_progress(&self);
    fn print_total_duration(&self);
}

#[derive(Debug, Default)]
struct ProgressState {
    started: Option<Instant>,
    finished: Option<Instant>,
    total_bytes: u64,
    done_bytes: u64,
    /// Last reported tenth, to log at most once per 10%
    last_step: u64,
}

/// Reports progress through tracing, at most once per 10% of bytes.
#[derive(Debug, Default)]
pub struct LogProgress {
    state: Mutex<ProgressState>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes completed so far.
    pub fn done_bytes(&self) -> u64 {
        self.state.lock().done_bytes
    }

    /// Time between start and end, or since start while running.
    pub fn elapsed(&self) -> Duration {
        let state = self.state.lock();
        match (state.started, state.finished) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

impl ProgressReporter for LogProgress {
    fn start_progress(&self, total_bytes: u64) {
        let mut state = self.state.lock();
        *state = ProgressState {
            started: Some(Instant::now()),
            total_bytes,
            ..ProgressState::default()
        };
        info!(total_bytes, "Ingest started");
    }

    fn update_progress(&self, bytes: u64) {
        let mut state = self.state.lock();
        state.done_bytes = state.done_bytes.saturating_add(bytes);
        if state.total_bytes == 0 {
            return;
        }
        let step = (state.done_bytes.min(state.total_bytes) * 10) / state.total_bytes;
        if step > state.last_step {
            state.last_step = step;
            info!(
                done_bytes = state.done_bytes,
                total_bytes = state.total_bytes,
                percent = step * 10,
                "Ingest progress"
            );
        }
    }

    fn end_progress(&self) {
        let mut state = self.state.lock();
        state.finished = Some(Instant::now());
        info!(done_bytes = state.done_bytes, "Ingest finished");
    }

    fn print_total_duration(&self) {
        let elapsed = self.elapsed();
        info!(elapsed_ms = elapsed.as_millis() as u64, "Total ingest duration: {:.2?}", elapsed);
    }
}
