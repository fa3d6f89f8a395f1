//! Batched tile generation against a remote compute service.
//!
//! Requests arriving within a short window are grouped by tile
//! configuration, query and dataset. Each group becomes one remote call
//! whose packed response is split back into per-caller tiles.
//!
//! # Architecture
//!
//! ```text
//! submit() ──► BatchQueue ──(window)──► BatchCoordinator::create_tiles
//!                                          │
//!                          consolidate ────┤  one JointRequest per group
//!                                          ▼
//!                           DatasetRegistry::ensure_registered
//!                                          ▼
//!                             RemoteCompute::query_tiles(Envelope)
//!                                          ▼
//!                             decode_tiles ──► RemoteTile::convert ──► callers
//! ```

mod coordinator;
mod registry;
mod remote;
mod request;
pub mod wire;

pub use coordinator::{
    BatchConfig, BatchCoordinator, BatchQueue, DEFAULT_MAX_REQUESTS, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_WINDOW,
};
pub use registry::DatasetRegistry;
pub use remote::{CountTile, HeatmapTile, RemoteCompute, RemoteTile};
pub use request::{consolidate, JointRequest, PendingTile, TileRequest, TileResponse};
pub use wire::{coord_key, decode_tiles, encode_tiles, Envelope, PackedTile, TileSpec, WireError};
