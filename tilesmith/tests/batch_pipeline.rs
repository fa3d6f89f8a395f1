//! End-to-end tests of coalesced, batched remote tile generation.
//!
//! RemoteGenerator → TileService (coalescing) → BatchQueue → BatchCoordinator
//! → mock remote service → packed response → per-caller tiles.

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tilesmith::batch::{
    encode_tiles, BatchConfig, BatchCoordinator, BatchQueue, CountTile, Envelope, HeatmapTile,
    RemoteCompute,
};
use tilesmith::coord::TileCoord;
use tilesmith::generator::{RemoteGenerator, TileService};
use tilesmith::params::Params;
use tilesmith::{TileError, TileResult};

// =============================================================================
// Test Helpers
// =============================================================================

/// Remote service that answers heatmap requests with every bin set to the
/// tile's x index, and count requests with `level`.
#[derive(Default)]
struct FakeCompute {
    registered: Mutex<Vec<String>>,
    envelopes: Mutex<Vec<Envelope>>,
    calls: AtomicUsize,
}

impl RemoteCompute for FakeCompute {
    async fn register_dataset(&self, config: &str) -> TileResult<()> {
        self.registered.lock().push(config.to_string());
        Ok(())
    }

    async fn query_tiles(&self, envelope: Bytes) -> TileResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope::from_bytes(&envelope)?;
        self.envelopes.lock().push(envelope.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let resolution = envelope.tile["resolution"].as_u64().unwrap_or(1) as usize;
        let tiles: Vec<(TileCoord, Vec<u8>)> = envelope
            .tile_specs
            .iter()
            .map(|spec| {
                let coord = TileCoord {
                    z: spec.level,
                    x: spec.x,
                    y: spec.y,
                };
                let payload = if resolution == 1 {
                    u32::from(spec.level).to_le_bytes().to_vec()
                } else {
                    (0..resolution * resolution)
                        .flat_map(|_| (spec.x as f32).to_le_bytes())
                        .collect()
                };
                (coord, payload)
            })
            .collect();
        Ok(encode_tiles(tiles.iter().map(|(c, p)| (c, p.as_slice()))))
    }
}

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap_or_default()
}

fn queue<K: tilesmith::batch::RemoteTile>(
    remote: &Arc<FakeCompute>,
    kind: K,
) -> Arc<BatchQueue> {
    let config = BatchConfig {
        window: Duration::from_millis(30),
        ..BatchConfig::default()
    };
    let coordinator = BatchCoordinator::new(Arc::clone(remote), kind, config);
    coordinator
        .add_dataset(r#"{"name":"taxi","source":"trips.parquet"}"#)
        .unwrap();
    Arc::new(BatchQueue::spawn(Arc::new(coordinator)))
}

// =============================================================================
// Pipeline Tests
// =============================================================================

#[tokio::test]
async fn test_identical_requests_share_one_tile_spec() {
    let remote = Arc::new(FakeCompute::default());
    let queue = queue(&remote, CountTile);
    let service = Arc::new(TileService::new({
        let queue = Arc::clone(&queue);
        move || RemoteGenerator::new(Arc::clone(&queue), "count")
    }));

    let coord = TileCoord { z: 7, x: 10, y: 20 };
    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .tile("taxi", coord, None, params(json!({ "xField": "x", "yField": "y" })))
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().as_ref(), br#"{"count":7}"#);
    }

    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    assert_eq!(remote.envelopes.lock()[0].tile_specs.len(), 1);
    assert_eq!(service.coalescer().stats().coalesced_requests, 7);
}

#[tokio::test]
async fn test_distinct_tiles_merge_into_one_call() {
    let remote = Arc::new(FakeCompute::default());
    let queue = queue(&remote, HeatmapTile);
    let service = Arc::new(TileService::new({
        let queue = Arc::clone(&queue);
        move || RemoteGenerator::new(Arc::clone(&queue), "heatmap")
    }));
    let tile_params = json!({ "xField": "x", "yField": "y", "resolution": 4 });

    let mut handles = Vec::new();
    for x in 0..5u32 {
        let service = Arc::clone(&service);
        let p = params(tile_params.clone());
        handles.push(tokio::spawn(async move {
            service.tile("taxi", TileCoord { z: 3, x, y: 1 }, None, p).await
        }));
    }

    for (x, handle) in handles.into_iter().enumerate() {
        let tile = handle.await.unwrap().unwrap();
        assert_eq!(tile.len(), 4 * 4 * 4);
        let first = f32::from_le_bytes([tile[0], tile[1], tile[2], tile[3]]);
        assert_eq!(first, x as f32);
    }

    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    let envelopes = remote.envelopes.lock();
    assert_eq!(envelopes[0].tile_specs.len(), 5);
    assert_eq!(envelopes[0].dataset, "taxi");
    assert_eq!(remote.registered.lock().len(), 1);
}

#[tokio::test]
async fn test_different_queries_are_separate_calls() {
    let remote = Arc::new(FakeCompute::default());
    let queue = queue(&remote, CountTile);
    let p = params(json!({ "xField": "x", "yField": "y" }));
    let coord = TileCoord { z: 2, x: 1, y: 1 };

    let cheap = Some(json!({ "range": { "field": "fare", "lt": 10 } }));
    let (a, b) = tokio::join!(
        queue.submit("taxi", coord, None, p.clone()),
        queue.submit("taxi", coord, cheap, p.clone()),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalid_params_fail_without_remote_call() {
    let remote = Arc::new(FakeCompute::default());
    let queue = queue(&remote, HeatmapTile);

    let result = queue
        .submit(
            "taxi",
            TileCoord { z: 0, x: 0, y: 0 },
            None,
            params(json!({ "xField": "x", "yField": "y", "resolution": 3 })),
        )
        .await;

    assert!(matches!(result, Err(TileError::Config(_))));
    assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
}
