//! Parallel ingest of input files.
//!
//! [`IngestInfo`] inventories a directory, [`WorkerPool`] runs a worker
//! function over the files with bounded concurrency, and a
//! [`ProgressReporter`] follows along.

mod info;
mod pool;
mod progress;

pub use info::{IngestFile, IngestInfo, IngestItem};
pub use pool::{default_workers, PoolConfig, PoolState, WorkerPool};
pub use progress::{LogProgress, ProgressReporter};

use std::path::PathBuf;
use thiserror::Error;

/// Errors from an ingest run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A worker reported failure for an item
    #[error("failed to ingest {item}: {message}")]
    Item { item: String, message: String },

    /// A worker task panicked or was aborted
    #[error("ingest worker failed: {0}")]
    Worker(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
