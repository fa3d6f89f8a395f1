//! Generator backed by the batch queue.

use super::Generator;
use crate::batch::BatchQueue;
use crate::coord::TileCoord;
use crate::error::TileResult;
use crate::params::Params;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;

/// Submits each tile to a [`BatchQueue`] so concurrent requests for the
/// same dataset and configuration share one remote call.
///
/// Parameters are validated by the queue's tile kind when the batch runs.
pub struct RemoteGenerator {
    queue: Arc<BatchQueue>,
    id: String,
    params: Params,
}

impl RemoteGenerator {
    pub fn new(queue: Arc<BatchQueue>, tile_type: &str) -> Self {
        Self {
            queue,
            id: format!("remote-{}", tile_type),
            params: Params::new(),
        }
    }
}

impl Generator for RemoteGenerator {
    fn id(&self) -> &str {
        &self.id
    }

    fn parse(&mut self, params: &Params) -> TileResult<()> {
        self.params = params.clone();
        Ok(())
    }

    async fn create(&self, uri: &str, coord: &TileCoord, query: Option<&Value>) -> TileResult<Bytes> {
        self.queue
            .submit(uri, *coord, query.cloned(), self.params.clone())
            .await
    }
}
