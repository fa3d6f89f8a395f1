//! Batch cycles against the remote compute service.
//!
//! One cycle takes every request collected during a window, groups them
//! into joint requests, issues one remote call per joint request and
//! routes each returned payload to the caller that asked for it.

use super::registry::DatasetRegistry;
use super::remote::{RemoteCompute, RemoteTile};
use super::request::{consolidate, JointRequest, TileRequest, TileResponse};
use super::wire::{decode_tiles, tile_key, Envelope, TileSpec};
use crate::coord::TileCoord;
use crate::error::{TileError, TileResult};
use crate::params::Params;
use bytes::Bytes;
use futures::future::join_all;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default batching window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(10);

/// Default cap on requests per cycle.
pub const DEFAULT_MAX_REQUESTS: usize = 256;

/// Default timeout for one remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of the request intake.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Runtime settings for batching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// How long a cycle keeps collecting after its first request
    pub window: Duration,
    /// Cycle is dispatched early once this many requests are collected
    pub max_requests: usize,
    /// Applied to each remote call
    pub request_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests: DEFAULT_MAX_REQUESTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Runs batch cycles for one tile kind against one remote service.
pub struct BatchCoordinator<C, K> {
    remote: Arc<C>,
    kind: K,
    registry: DatasetRegistry,
    config: BatchConfig,
}

impl<C: RemoteCompute, K: RemoteTile> BatchCoordinator<C, K> {
    pub fn new(remote: Arc<C>, kind: K, config: BatchConfig) -> Self {
        Self {
            remote,
            kind,
            registry: DatasetRegistry::new(),
            config,
        }
    }

    /// Adds a dataset configuration; requests name datasets by its `name`.
    pub fn add_dataset(&self, config: impl Into<String>) -> TileResult<String> {
        self.registry.add(config)
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Generates a single tile outside of any queue.
    pub async fn create(
        &self,
        uri: &str,
        coord: TileCoord,
        query: Option<Value>,
        params: Params,
    ) -> TileResponse {
        let (request, receiver) = TileRequest::new(uri, coord, query, params);
        self.create_tiles(vec![request]).await;
        receiver
            .await
            .unwrap_or_else(|_| Err(TileError::backend("batch cycle dropped the request")))
    }

    /// Runs one batch cycle. Every request receives exactly one response.
    pub async fn create_tiles(&self, requests: Vec<TileRequest>) {
        let count = requests.len();
        let mut joints = Vec::with_capacity(count);
        for request in requests {
            match self.kind.build_config(&request.params) {
                Ok(config) => joints.push(JointRequest::single(request, config)),
                Err(err) => {
                    debug!(coord = %request.coord, error = %err, "Rejected tile request");
                    request.respond(Err(err));
                }
            }
        }

        let joints = consolidate(joints);
        info!(
            tile_type = self.kind.tile_type(),
            requests = count,
            joint_requests = joints.len(),
            "Processing batch"
        );

        join_all(joints.into_iter().map(|joint| self.dispatch(joint))).await;
    }

    async fn dispatch(&self, joint: JointRequest) {
        if let Err(err) = self
            .registry
            .ensure_registered(&self.remote, &joint.dataset, self.config.request_timeout)
            .await
        {
            joint.fail(err);
            return;
        }

        let packed = match self.query(&joint).await {
            Ok(packed) => packed,
            Err(err) => {
                warn!(
                    dataset = %joint.dataset,
                    tiles = joint.tiles.len(),
                    error = %err,
                    "Remote tile request failed"
                );
                joint.fail(err);
                return;
            }
        };

        let tiles = match decode_tiles(packed) {
            Ok(tiles) => tiles,
            Err(err) => {
                warn!(dataset = %joint.dataset, error = %err, "Discarding malformed tile response");
                joint.fail(err.into());
                return;
            }
        };

        let JointRequest {
            tile_config,
            tiles: pending,
            ..
        } = joint;
        for tile in pending {
            let response = match tiles.get(&tile_key(&tile.coord)) {
                Some(packed) => self.kind.convert(&tile_config, &tile.coord, &packed.data),
                None => {
                    debug!(coord = %tile.coord, "No tile in response - using default");
                    self.kind.default_tile(&tile_config)
                }
            };
            tile.respond(response);
        }
    }

    async fn query(&self, joint: &JointRequest) -> TileResult<Bytes> {
        let specs: BTreeSet<TileSpec> = joint.tiles.iter().map(|t| TileSpec::from(&t.coord)).collect();
        let envelope = Envelope {
            tile: joint.tile_config.clone(),
            query: joint.query.clone(),
            dataset: joint.dataset.clone(),
            tile_specs: specs.into_iter().collect(),
        }
        .to_bytes()?;

        debug!(
            dataset = %joint.dataset,
            tiles = joint.tiles.len(),
            bytes = envelope.len(),
            "Sending joint tile request"
        );
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, self.remote.query_tiles(envelope)).await {
            Ok(result) => result,
            Err(_) => Err(TileError::Timeout(timeout)),
        }
    }
}

/// Collects requests into windows and hands each window to a coordinator.
///
/// Cycles run as their own tasks, so a slow remote call does not hold up
/// the next window.
pub struct BatchQueue {
    sender: mpsc::Sender<TileRequest>,
    handle: JoinHandle<()>,
}

impl BatchQueue {
    /// Starts the collecting task on the current runtime.
    pub fn spawn<C: RemoteCompute, K: RemoteTile>(coordinator: Arc<BatchCoordinator<C, K>>) -> Self {
        let (sender, receiver) = mpsc::channel(coordinator.config.queue_capacity.max(1));
        let handle = tokio::spawn(collect(receiver, coordinator));
        Self { sender, handle }
    }

    /// Submits one request and waits for its tile.
    pub async fn submit(
        &self,
        uri: &str,
        coord: TileCoord,
        query: Option<Value>,
        params: Params,
    ) -> TileResponse {
        let (request, receiver) = TileRequest::new(uri, coord, query, params);
        if self.sender.send(request).await.is_err() {
            return Err(TileError::backend("batch queue is closed"));
        }
        receiver
            .await
            .unwrap_or_else(|_| Err(TileError::backend("batch cycle dropped the request")))
    }

    /// A sender for callers that manage their own receivers.
    pub fn sender(&self) -> mpsc::Sender<TileRequest> {
        self.sender.clone()
    }

    /// Closes the intake and waits for the collecting task to finish.
    ///
    /// Cycles already dispatched keep running to completion.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(err) = self.handle.await {
            warn!(error = %err, "Batch collector task failed");
        }
    }
}

async fn collect<C: RemoteCompute, K: RemoteTile>(
    mut receiver: mpsc::Receiver<TileRequest>,
    coordinator: Arc<BatchCoordinator<C, K>>,
) {
    let window = coordinator.config.window;
    let max_requests = coordinator.config.max_requests.max(1);

    while let Some(first) = receiver.recv().await {
        let deadline = Instant::now() + window;
        let mut batch = vec![first];
        while batch.len() < max_requests {
            match tokio::time::timeout_at(deadline, receiver.recv()).await {
                Ok(Some(request)) => batch.push(request),
                // closed or window elapsed
                Ok(None) | Err(_) => break,
            }
        }

        debug!(requests = batch.len(), "Batch window closed");
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.create_tiles(batch).await });
    }
    debug!("Batch intake closed");
}
