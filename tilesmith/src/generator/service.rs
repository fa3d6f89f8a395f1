//! Coalesced tile generation.

use super::{fingerprint, Generator};
use crate::coalesce::RequestCoalescer;
use crate::coord::TileCoord;
use crate::error::TileResult;
use crate::params::Params;
use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

type Factory<G> = Box<dyn Fn() -> G + Send + Sync>;

/// Serves tiles from fresh generator instances, running at most one
/// generation per fingerprint at a time.
pub struct TileService<G> {
    factory: Factory<G>,
    coalescer: RequestCoalescer<Bytes>,
}

impl<G: Generator> TileService<G> {
    pub fn new(factory: impl Fn() -> G + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            coalescer: RequestCoalescer::new(),
        }
    }

    /// Parses `params` into a new generator and produces the tile, sharing
    /// the result with identical requests already in flight.
    ///
    /// Parameter errors are returned before any coalescing happens.
    pub async fn tile(
        &self,
        uri: &str,
        coord: TileCoord,
        query: Option<Value>,
        params: Params,
    ) -> TileResult<Bytes> {
        let mut generator = (self.factory)();
        generator.parse(&params)?;

        let key = fingerprint(generator.id(), uri, &coord, query.as_ref(), &params);
        debug!(generator = generator.id(), coord = %coord, fingerprint = %key, "Tile requested");

        let uri = uri.to_string();
        self.coalescer
            .get_or_compute(&key, move || async move {
                generator.create(&uri, &coord, query.as_ref()).await
            })
            .await
    }

    pub fn coalescer(&self) -> &RequestCoalescer<Bytes> {
        &self.coalescer
    }
}
