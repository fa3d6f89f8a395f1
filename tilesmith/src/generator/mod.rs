//! Tile generators.
//!
//! A [`Generator`] is configured once per request from its JSON parameters
//! and then produces the bytes of one tile. Direct generators query a
//! [`QueryBackend`]; [`RemoteGenerator`] hands the tile to a batch queue.
//! [`TileService`] puts request coalescing in front of any generator.

mod backend;
mod direct;
mod remote;
mod service;

pub use backend::{
    field, matches_query, BinRequest, Bivariate, HitRequest, MemoryBackend, Projection,
    QueryBackend,
};
pub use direct::{
    CountGenerator, EdgeGenerator, HeatmapGenerator, MacroGenerator, MicroGenerator,
    TopTermsGenerator, DEFAULT_EDGE_LIMIT, DEFAULT_MICRO_THRESHOLD, DEFAULT_TERMS_SIZE,
};
pub use remote::RemoteGenerator;
pub use service::TileService;

use crate::coord::{TileCoord, MAX_TILE_RESOLUTION};
use crate::error::TileResult;
use crate::params::Params;
use bytes::Bytes;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::future::Future;

/// Something that can produce a tile.
pub trait Generator: Send + Sync + 'static {
    /// Stable identifier of the generator type, part of the fingerprint.
    fn id(&self) -> &str;

    /// Reads generator-specific parameters. Errors are
    /// [`TileError::Config`](crate::error::TileError::Config).
    fn parse(&mut self, params: &Params) -> TileResult<()>;

    /// Produces the tile at `coord` of dataset `uri`.
    fn create(
        &self,
        uri: &str,
        coord: &TileCoord,
        query: Option<&Value>,
    ) -> impl Future<Output = TileResult<Bytes>> + Send;
}

/// Fallback parameter values for direct generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDefaults {
    pub resolution: u32,
    pub lod: usize,
}

impl Default for TileDefaults {
    fn default() -> Self {
        Self {
            resolution: MAX_TILE_RESOLUTION,
            lod: 0,
        }
    }
}

/// Identifies a tile request: lowercase hex SHA-256 of the canonical JSON
/// of its inputs.
///
/// Object keys are serialized in sorted order, so parameter maps that
/// differ only in key order share a fingerprint.
pub fn fingerprint(
    generator_id: &str,
    uri: &str,
    coord: &TileCoord,
    query: Option<&Value>,
    params: &Params,
) -> String {
    let canonical = json!({
        "generator": generator_id,
        "uri": uri,
        "coord": [coord.z, coord.x, coord.y],
        "query": query,
        "params": params,
    })
    .to_string();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}
