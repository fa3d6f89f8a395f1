//! Settings structs, one per INI section.

use super::defaults::*;
use crate::batch::BatchConfig;
use crate::generator::TileDefaults;
use crate::ingest::{default_workers, PoolConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub batch: BatchSettings,
    pub tiles: TileSettings,
    pub ingest: IngestSettings,
    pub logging: LoggingSettings,
}

/// `[batch]`
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    pub window_ms: u64,
    pub max_requests: usize,
    pub request_timeout_secs: u64,
    pub queue_capacity: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            max_requests: DEFAULT_BATCH_MAX_REQUESTS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            queue_capacity: DEFAULT_BATCH_QUEUE_CAPACITY,
        }
    }
}

impl BatchSettings {
    pub fn to_batch_config(&self) -> BatchConfig {
        BatchConfig {
            window: Duration::from_millis(self.window_ms),
            max_requests: self.max_requests,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            queue_capacity: self.queue_capacity,
        }
    }
}

/// `[tiles]`
#[derive(Debug, Clone, PartialEq)]
pub struct TileSettings {
    pub resolution: u32,
    pub lod: usize,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            lod: DEFAULT_LOD,
        }
    }
}

impl TileSettings {
    pub fn to_tile_defaults(&self) -> TileDefaults {
        TileDefaults {
            resolution: self.resolution,
            lod: self.lod,
        }
    }
}

/// `[ingest]`
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub workers: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl IngestSettings {
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.workers)
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}
