//! Request coalescing for tile generation.
//!
//! When many callers ask for the same tile at once, only one generation
//! runs; everyone else waits for its result.
//!
//! # Architecture
//!
//! ```text
//! Request A ─┐
//!            │                                 Generator
//! Request B ─┼──► RequestCoalescer ──────────► (one task)
//!            │        │                            │
//! Request C ─┘        │                            │
//!                     ▼                            ▼
//!               [A, B, C all                 result broadcast
//!                receive same ◄────────────── then entry removed
//!                result]
//! ```
//!
//! # Implementation
//!
//! Uses a `HashMap<String, broadcast::Sender>` keyed by request fingerprint.
//! The map lock is only held to insert, subscribe or remove; never while
//! waiting. The entry is removed before the result is broadcast, so a request
//! issued after completion computes afresh: this deduplicates in-flight work,
//! it does not cache results.

use crate::error::{TileError, TileResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

type InFlightMap<T> = Arc<Mutex<HashMap<String, broadcast::Sender<TileResult<T>>>>>;

/// Tracks in-flight generations keyed by fingerprint.
///
/// Each instance owns its own map, so independent services (and tests) never
/// share state.
pub struct RequestCoalescer<T> {
    in_flight: InFlightMap<T>,
    stats: Mutex<CoalescerStats>,
}

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Total requests received
    pub total_requests: u64,
    /// Requests that waited on existing work
    pub coalesced_requests: u64,
    /// Requests that triggered new work
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Outcome of registering a fingerprint.
enum Registration<T> {
    /// First caller: owns the entry and must run the computation.
    Leader {
        entry: InFlightEntry<T>,
        receiver: broadcast::Receiver<TileResult<T>>,
    },
    /// Work already in flight: wait on this receiver.
    Waiter(broadcast::Receiver<TileResult<T>>),
}

/// Ownership of one map entry.
///
/// Removes the entry when completed, or when dropped without completing
/// (e.g. the computation panicked), so a failed generation never leaves a
/// stale entry behind.
struct InFlightEntry<T> {
    map: InFlightMap<T>,
    fingerprint: Option<String>,
}

impl<T> InFlightEntry<T> {
    /// Removes the entry and hands back its sender for broadcasting.
    fn complete(&mut self) -> Option<broadcast::Sender<TileResult<T>>> {
        let fingerprint = self.fingerprint.take()?;
        self.map.lock().remove(&fingerprint)
    }
}

impl<T> Drop for InFlightEntry<T> {
    fn drop(&mut self) {
        if let Some(fingerprint) = self.fingerprint.take() {
            warn!(
                fingerprint = %fingerprint,
                "Generation ended without a result - releasing waiters"
            );
            self.map.lock().remove(&fingerprint);
        }
    }
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a new request coalescer.
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            stats: Mutex::new(CoalescerStats::default()),
        }
    }

    /// Returns the result for `fingerprint`, running `compute` only if no
    /// generation for it is already in flight.
    ///
    /// The computation is spawned onto the runtime, so it still completes
    /// and releases its waiters if the calling future is dropped. Every
    /// caller sharing the fingerprint observes the same value or error.
    pub async fn get_or_compute<F, Fut>(&self, fingerprint: &str, compute: F) -> TileResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TileResult<T>> + Send + 'static,
    {
        let receiver = match self.register(fingerprint) {
            Registration::Leader {
                mut entry,
                receiver,
            } => {
                let work = compute();
                tokio::spawn(async move {
                    let result = work.await;
                    if let Some(sender) = entry.complete() {
                        let waiters = sender.receiver_count();
                        // Receivers may have been dropped; nothing to do then
                        let _ = sender.send(result);
                        debug!(waiters, "Broadcast generation result");
                    }
                });
                receiver
            }
            Registration::Waiter(receiver) => receiver,
        };
        Self::wait(receiver).await
    }

    fn register(&self, fingerprint: &str) -> Registration<T> {
        let mut in_flight = self.in_flight.lock();
        let mut stats = self.stats.lock();
        stats.total_requests += 1;

        if let Some(sender) = in_flight.get(fingerprint) {
            stats.coalesced_requests += 1;
            debug!(
                fingerprint = %fingerprint,
                coalesced = stats.coalesced_requests,
                "Coalescing request - waiting for in-flight generation"
            );
            return Registration::Waiter(sender.subscribe());
        }

        // A single result is ever sent per entry
        let (sender, receiver) = broadcast::channel(1);
        in_flight.insert(fingerprint.to_string(), sender);
        stats.new_requests += 1;
        debug!(
            fingerprint = %fingerprint,
            in_flight_count = in_flight.len(),
            "New request - starting generation"
        );
        Registration::Leader {
            entry: InFlightEntry {
                map: Arc::clone(&self.in_flight),
                fingerprint: Some(fingerprint.to_string()),
            },
            receiver,
        }
    }

    async fn wait(mut receiver: broadcast::Receiver<TileResult<T>>) -> TileResult<T> {
        match receiver.recv().await {
            Ok(result) => result,
            Err(_) => Err(TileError::backend(
                "tile generation ended without producing a result",
            )),
        }
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        self.stats.lock().clone()
    }

    /// Returns the number of currently in-flight generations.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            new_requests = stats.new_requests,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Request coalescing statistics"
        );
    }
}

impl<T> Default for RequestCoalescer<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
