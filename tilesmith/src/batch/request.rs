//! Tile requests and their consolidation into joint requests.

use crate::coord::TileCoord;
use crate::error::TileResult;
use crate::params::Params;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::oneshot;

/// What a tile caller eventually receives.
pub type TileResponse = TileResult<Bytes>;

/// One caller's request for one tile.
///
/// `uri` names the dataset. The caller keeps the receiver returned by
/// [`TileRequest::new`] and exactly one response is sent on it.
#[derive(Debug)]
pub struct TileRequest {
    pub uri: String,
    pub coord: TileCoord,
    pub query: Option<Value>,
    pub params: Params,
    pub responder: oneshot::Sender<TileResponse>,
}

impl TileRequest {
    pub fn new(
        uri: impl Into<String>,
        coord: TileCoord,
        query: Option<Value>,
        params: Params,
    ) -> (Self, oneshot::Receiver<TileResponse>) {
        let (responder, receiver) = oneshot::channel();
        let request = Self {
            uri: uri.into(),
            coord,
            query,
            params,
            responder,
        };
        (request, receiver)
    }

    /// Delivers the response. A caller that stopped waiting is ignored.
    pub fn respond(self, response: TileResponse) {
        let _ = self.responder.send(response);
    }
}

/// A tile awaiting its share of a joint response.
#[derive(Debug)]
pub struct PendingTile {
    pub coord: TileCoord,
    pub responder: oneshot::Sender<TileResponse>,
}

impl PendingTile {
    pub fn respond(self, response: TileResponse) {
        let _ = self.responder.send(response);
    }
}

/// Requests sharing tile configuration, query and dataset, answered by a
/// single remote call.
#[derive(Debug)]
pub struct JointRequest {
    pub tile_config: Value,
    pub query: Option<Value>,
    pub params: Params,
    pub dataset: String,
    pub tiles: Vec<PendingTile>,
}

impl JointRequest {
    /// Wraps a single request whose tile configuration is already built.
    pub fn single(request: TileRequest, tile_config: Value) -> Self {
        Self {
            tile_config,
            query: request.query,
            params: request.params,
            dataset: request.uri,
            tiles: vec![PendingTile {
                coord: request.coord,
                responder: request.responder,
            }],
        }
    }

    /// Structural equality of tile configuration and query, and the same
    /// dataset. Raw parameters are not compared.
    pub fn can_merge(&self, other: &JointRequest) -> bool {
        self.dataset == other.dataset
            && self.tile_config == other.tile_config
            && self.query == other.query
    }

    /// Takes over every pending tile of `other`.
    pub fn merge(&mut self, other: JointRequest) {
        self.tiles.extend(other.tiles);
    }

    /// Fails every tile of this request with the same error.
    pub fn fail(self, err: crate::error::TileError) {
        for tile in self.tiles {
            tile.respond(Err(err.clone()));
        }
    }
}

/// Merges every mergeable pair, preserving first-seen order.
///
/// Quadratic in the number of distinct joints, which stays small per cycle.
pub fn consolidate(requests: Vec<JointRequest>) -> Vec<JointRequest> {
    let mut joints: Vec<JointRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        match joints.iter_mut().find(|joint| joint.can_merge(&request)) {
            Some(joint) => joint.merge(request),
            None => joints.push(request),
        }
    }
    joints
}
