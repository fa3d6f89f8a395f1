//! Default values for every configuration key.

use crate::batch::{DEFAULT_MAX_REQUESTS, DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WINDOW};
use crate::coord::MAX_TILE_RESOLUTION;

/// `[batch] window_ms`
pub const DEFAULT_WINDOW_MS: u64 = DEFAULT_WINDOW.as_millis() as u64;

/// `[batch] max_requests`
pub const DEFAULT_BATCH_MAX_REQUESTS: usize = DEFAULT_MAX_REQUESTS;

/// `[batch] request_timeout_secs`
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = DEFAULT_REQUEST_TIMEOUT.as_secs();

/// `[batch] queue_capacity`
pub const DEFAULT_BATCH_QUEUE_CAPACITY: usize = DEFAULT_QUEUE_CAPACITY;

/// `[tiles] resolution`
pub const DEFAULT_RESOLUTION: u32 = MAX_TILE_RESOLUTION;

/// `[tiles] lod`
pub const DEFAULT_LOD: usize = 0;

/// `[logging] directory`
pub const DEFAULT_LOG_DIRECTORY: &str = "logs";

/// `[logging] file`
pub const DEFAULT_LOG_FILE: &str = "tilesmith.log";

/// Upper bound accepted for `[ingest] workers`.
pub const MAX_INGEST_WORKERS: usize = 256;
