//! Tilesmith - tile generation for large point and edge datasets
//!
//! Tiles are addressed in a quadtree pyramid ([`coord`]) and produced by
//! generators ([`generator`]) that either query a search backend directly
//! or hand tiles to a remote compute service in batches ([`batch`]).
//! Identical concurrent requests share one generation ([`coalesce`]), and
//! point/edge tiles can be encoded for progressive level-of-detail
//! rendering ([`lod`]). Input files are loaded by a bounded worker pool
//! ([`ingest`]).
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilesmith::generator::{HeatmapGenerator, MemoryBackend, TileService};
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let service = TileService::new(move || HeatmapGenerator::new(Arc::clone(&backend)));
//! let tile = service.tile("trips", coord, None, params).await?;
//! ```

pub mod batch;
pub mod coalesce;
pub mod config;
pub mod coord;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod lod;
pub mod logging;
pub mod params;

pub use error::{TileError, TileResult};

/// Version of the tilesmith library and CLI, from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
