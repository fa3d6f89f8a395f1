//! End-to-end tests of direct generation from an in-memory backend.

use serde_json::{json, Value};
use std::sync::Arc;
use tilesmith::coord::{lon_lat_to_fractional_tile, to_tile_coords, LonLat};
use tilesmith::generator::{
    CountGenerator, EdgeGenerator, MacroGenerator, MemoryBackend, TileDefaults, TileService,
};
use tilesmith::lod::{decode_edges_lod, decode_points_lod, morton_code};
use tilesmith::params::Params;

const LONDON: (f64, f64) = (-0.1278, 51.5074);
const PARIS: (f64, f64) = (2.3522, 48.8566);
const NEW_YORK: (f64, f64) = (-74.0060, 40.7128);

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap_or_default()
}

fn backend() -> Arc<MemoryBackend> {
    let place = |(lon, lat): (f64, f64), dest: (f64, f64)| {
        json!({ "lon": lon, "lat": lat, "dest": { "lon": dest.0, "lat": dest.1 } })
    };
    let backend = MemoryBackend::new();
    backend.insert(
        "cities",
        vec![
            place(LONDON, PARIS),
            place(PARIS, LONDON),
            place(NEW_YORK, LONDON),
            place(LONDON, NEW_YORK),
        ],
    );
    Arc::new(backend)
}

#[tokio::test]
async fn test_count_tiles_follow_geography() {
    let backend = backend();
    let service = TileService::new(move || CountGenerator::new(Arc::clone(&backend)));
    let p = params(json!({ "xField": "lon", "yField": "lat" }));

    let europe = to_tile_coords(LONDON.1, LONDON.0, 3).unwrap();
    let america = to_tile_coords(NEW_YORK.1, NEW_YORK.0, 3).unwrap();
    assert_ne!(europe, america);

    // Paris is one tile east of London at this zoom
    let tile = service.tile("cities", europe, None, p.clone()).await.unwrap();
    assert_eq!(tile.as_ref(), br#"{"count":2}"#);
    let tile = service.tile("cities", america, None, p).await.unwrap();
    assert_eq!(tile.as_ref(), br#"{"count":1}"#);
}

#[tokio::test]
async fn test_macro_lod_tile_is_morton_ordered() {
    let backend = backend();
    let defaults = TileDefaults {
        resolution: 64,
        lod: 3,
    };
    let service =
        TileService::new(move || MacroGenerator::with_defaults(Arc::clone(&backend), defaults));

    let tile = service
        .tile(
            "cities",
            tilesmith::coord::TileCoord { z: 0, x: 0, y: 0 },
            None,
            params(json!({ "xField": "lon", "yField": "lat" })),
        )
        .await
        .unwrap();

    let decoded = decode_points_lod(&tile).unwrap();
    assert_eq!(decoded.records.len(), 3, "London, Paris and New York bins");
    assert_eq!(decoded.offsets.len(), 3);
    assert_eq!(*decoded.offsets.last().unwrap(), 3);

    let codes: Vec<u32> = decoded.records.iter().map(|p| morton_code(p.x, p.y)).collect();
    assert!(codes.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_edges_start_inside_tile() {
    let backend = backend();
    let service = TileService::new(move || EdgeGenerator::new(Arc::clone(&backend)));
    let tile_coord = to_tile_coords(LONDON.1, LONDON.0, 4).unwrap();

    let tile = service
        .tile(
            "cities",
            tile_coord,
            None,
            params(json!({
                "srcXField": "lon", "srcYField": "lat",
                "dstXField": "dest.lon", "dstYField": "dest.lat",
                "lod": 2
            })),
        )
        .await
        .unwrap();

    let decoded = decode_edges_lod(&tile).unwrap();
    assert_eq!(decoded.records.len(), 2, "both edges leaving London");
    for edge in &decoded.records {
        assert!((0.0..256.0).contains(&edge.src_x));
        assert!((0.0..256.0).contains(&edge.src_y));
        assert_eq!(edge.weight, 1.0);
    }

    let london = lon_lat_to_fractional_tile(&LonLat { lon: LONDON.0, lat: LONDON.1 }, 4);
    let expected_x = ((london.x - f64::from(tile_coord.x)) * 256.0) as f32;
    assert!(decoded.records.iter().all(|e| (e.src_x - expected_x).abs() < 1e-3));
}
