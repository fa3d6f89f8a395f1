//! Tests for the tile pyramid coordinate system

use super::*;
use proptest::prelude::*;

fn unit_bounds() -> Bounds {
    Bounds::new(0.0, 1.0, 1.0, 0.0)
}

#[test]
fn test_new_york_city_at_zoom_16() {
    // New York City: 40.7128°N, 74.0060°W
    let tile = to_tile_coords(40.7128, -74.0060, 16).unwrap();
    assert_eq!(tile.y, 24640, "NYC latitude should map to row 24640");
    assert_eq!(tile.x, 19295, "NYC longitude should map to column 19295");
    assert_eq!(tile.z, 16);
}

#[test]
fn test_london_at_zoom_10() {
    let tile = to_tile_coords(51.5074, -0.1278, 10).unwrap();
    assert_eq!((tile.x, tile.y), (511, 340));
}

#[test]
fn test_equator_prime_meridian() {
    // At zoom 1: 2×2 tiles, the origin sits on the corner of tile (1, 1)
    let tile = to_tile_coords(0.0, 0.0, 1).unwrap();
    assert_eq!((tile.x, tile.y), (1, 1));
}

#[test]
fn test_far_east_edge_stays_in_last_column() {
    let tile = to_tile_coords(0.0, 180.0, 3).unwrap();
    assert_eq!(tile.x, 7);
}

#[test]
fn test_invalid_inputs_are_rejected() {
    assert!(matches!(
        to_tile_coords(90.0, 0.0, 10),
        Err(CoordError::InvalidLatitude(_))
    ));
    assert!(matches!(
        to_tile_coords(0.0, -181.0, 10),
        Err(CoordError::InvalidLongitude(_))
    ));
    assert!(matches!(
        to_tile_coords(0.0, 0.0, 25),
        Err(CoordError::InvalidZoom(25))
    ));
}

#[test]
fn test_tile_coord_new_validates_indices() {
    assert!(TileCoord::new(0, 0, 0).is_ok());
    assert!(TileCoord::new(3, 7, 7).is_ok());
    assert_eq!(
        TileCoord::new(3, 8, 0),
        Err(CoordError::TileOutOfRange { z: 3, x: 8, y: 0 })
    );
    assert_eq!(TileCoord::new(25, 0, 0), Err(CoordError::InvalidZoom(25)));
}

#[test]
fn test_children_and_parent() {
    let tile = TileCoord { z: 4, x: 5, y: 9 };
    let children = tile.children().unwrap();
    assert_eq!(children[0], TileCoord { z: 5, x: 10, y: 18 });
    assert_eq!(children[3], TileCoord { z: 5, x: 11, y: 19 });
    for child in children {
        assert_eq!(child.parent(), Some(tile));
    }
    assert!(TileCoord { z: 0, x: 0, y: 0 }.parent().is_none());
    assert!(TileCoord {
        z: MAX_LEVEL_SUPPORTED,
        x: 0,
        y: 0
    }
    .children()
    .is_none());
}

#[test]
fn test_hand_built_invalid_coords_do_not_panic() {
    let deep = TileCoord { z: 64, x: 0, y: 0 };
    assert!(!deep.is_valid());
    assert_eq!(deep.dim(), u64::MAX);
    assert!(deep.children().is_none());
    let bounds = tile_pixel_bounds(&deep);
    assert_eq!(bounds.top_left, (0, 0));
    assert!(bounds.bottom_right.0 <= MAX_PIXELS);

    let wide = TileCoord { z: 3, x: u32::MAX, y: u32::MAX };
    assert!(!wide.is_valid());
    assert!(wide.children().is_none());
    assert_eq!(tile_pixel_bounds(&wide).bottom_right, (MAX_PIXELS, MAX_PIXELS));

    assert!(TileCoord { z: 24, x: (1 << 24) - 1, y: 0 }.is_valid());
}

#[test]
fn test_to_pixel_clamps_extremes() {
    assert_eq!(to_pixel(-0.5, 0.0), PixelCoord { x: 0, y: 0 });
    assert_eq!(
        to_pixel(1.0, 7.0),
        PixelCoord {
            x: MAX_PIXELS - 1,
            y: MAX_PIXELS - 1
        }
    );
    assert_eq!(to_pixel(f64::NAN, f64::INFINITY).x, 0);
    assert_eq!(to_pixel(0.5, 0.25), PixelCoord::new(MAX_PIXELS / 2, MAX_PIXELS / 4));
}

#[test]
fn test_root_tile_covers_every_pixel() {
    let bounds = tile_pixel_bounds(&TileCoord { z: 0, x: 0, y: 0 });
    assert_eq!(bounds.top_left, (0, 0));
    assert_eq!(bounds.bottom_right, (MAX_PIXELS, MAX_PIXELS));
}

#[test]
fn test_normalize_accepts_either_y_orientation() {
    let y_up = Bounds::new(-10.0, 10.0, -10.0, 10.0);
    let y_down = Bounds::new(-10.0, 10.0, 10.0, -10.0);
    let point = Coord { x: 5.0, y: 5.0 };

    let (u, v) = normalize(&point, &y_up);
    assert!((u - 0.75).abs() < 1e-12);
    assert!((v - 0.25).abs() < 1e-12, "y-up data: top edge is v = 0");

    let (_, v) = normalize(&point, &y_down);
    assert!((v - 0.75).abs() < 1e-12);
}

#[test]
fn test_degenerate_bounds_map_to_origin() {
    let bounds = Bounds::new(3.0, 3.0, 1.0, 1.0);
    assert_eq!(normalize(&Coord { x: 9.0, y: 9.0 }, &bounds), (0.0, 0.0));
}

#[test]
fn test_geographic_origin_is_north_west() {
    let north_west = lon_lat_to_pixel(&LonLat {
        lon: -180.0,
        lat: 89.0,
    });
    assert_eq!(north_west, PixelCoord { x: 0, y: 0 });

    let south_east = lon_lat_to_pixel(&LonLat {
        lon: 180.0,
        lat: -89.0,
    });
    assert_eq!(south_east, PixelCoord::new(MAX_PIXELS, MAX_PIXELS));
}

#[test]
fn test_fractional_tile_matches_strict_tile() {
    let lon_lat = LonLat {
        lon: -74.0060,
        lat: 40.7128,
    };
    let frac = lon_lat_to_fractional_tile(&lon_lat, 16);
    let tile = to_tile_coords(lon_lat.lat, lon_lat.lon, 16).unwrap();
    assert_eq!(frac.x.floor() as u32, tile.x);
    assert_eq!(frac.y.floor() as u32, tile.y);
}

#[test]
fn test_bin_index_inside_and_outside_tile() {
    let tile = TileCoord { z: 1, x: 1, y: 0 };
    let bounds = unit_bounds();

    let inside = fractional_tile(&Coord { x: 0.76, y: 0.26 }, 1, &bounds);
    assert_eq!(bin_index(&inside, &tile, 4), Some((2, 2)));

    let outside = fractional_tile(&Coord { x: 0.25, y: 0.25 }, 1, &bounds);
    assert_eq!(bin_index(&outside, &tile, 4), None);
    assert_eq!(bin_index(&inside, &tile, 0), None);
}

#[test]
fn test_tile_local_pixel() {
    let tile = TileCoord { z: 1, x: 1, y: 1 };
    let point = fractional_tile(&Coord { x: 0.75, y: 0.5 }, 1, &unit_bounds());
    let (x, y) = tile_local_pixel(&point, &tile);
    assert!((x - 128.0).abs() < 1e-9);
    assert!(y.abs() < 1e-9);
}

#[test]
fn test_bin_center() {
    assert_eq!(bin_center(0, 4), (32.0, 32.0));
    assert_eq!(bin_center(5, 4), (96.0, 96.0));
    assert_eq!(bin_center(3, 4), (224.0, 32.0));
}

#[test]
fn test_tile_to_lon_lat_round_trip() {
    let lat = 51.5074;
    let lon = -0.1278;
    for zoom in [0, 5, 10, 15, 18] {
        let tile = to_tile_coords(lat, lon, zoom).unwrap();
        let corner = tile_to_lon_lat(&tile);
        let tile_size_degrees = 360.0 / (2.0_f64.powi(zoom as i32));
        assert!(
            (corner.lat - lat).abs() < tile_size_degrees,
            "Zoom {}: latitude drifted more than one tile",
            zoom
        );
        assert!((corner.lon - lon).abs() < tile_size_degrees);
    }
}

fn any_tile() -> impl Strategy<Value = TileCoord> {
    (0u8..MAX_LEVEL_SUPPORTED).prop_flat_map(|z| {
        let dim = 1u32 << z;
        (Just(z), 0..dim, 0..dim).prop_map(|(z, x, y)| TileCoord { z, x, y })
    })
}

proptest! {
    /// Property: pixels are always clamped into [0, MAX_PIXELS - 1].
    #[test]
    fn prop_to_pixel_always_in_range(u in -10.0f64..10.0, v in -10.0f64..10.0) {
        let pixel = to_pixel(u, v);
        prop_assert!(pixel.x < MAX_PIXELS);
        prop_assert!(pixel.y < MAX_PIXELS);
        if u <= 0.0 { prop_assert_eq!(pixel.x, 0); }
        if u >= 1.0 { prop_assert_eq!(pixel.x, MAX_PIXELS - 1); }
    }

    /// Property: the four children of a tile exactly tile their parent.
    #[test]
    fn prop_children_union_equals_parent_bounds(tile in any_tile()) {
        let parent = tile_pixel_bounds(&tile);
        let children = tile.children().unwrap().map(|c| tile_pixel_bounds(&c));

        let min_x = children.iter().map(|b| b.top_left.0).min().unwrap();
        let min_y = children.iter().map(|b| b.top_left.1).min().unwrap();
        let max_x = children.iter().map(|b| b.bottom_right.0).max().unwrap();
        let max_y = children.iter().map(|b| b.bottom_right.1).max().unwrap();

        prop_assert_eq!((min_x, min_y), parent.top_left);
        prop_assert_eq!((max_x, max_y), parent.bottom_right);
        // children share their inner edges
        prop_assert_eq!(children[0].bottom_right.0, children[1].top_left.0);
        prop_assert_eq!(children[0].bottom_right.1, children[2].top_left.1);
    }

    /// Property: a pixel computed from a point inside a tile falls inside that tile's bounds.
    #[test]
    fn prop_pixel_lands_in_its_tile(x in 0.0f64..1.0, y in 0.0f64..1.0, zoom in 0u8..=MAX_LEVEL_SUPPORTED) {
        let coord = Coord { x, y };
        let bounds = unit_bounds();
        let frac = fractional_tile(&coord, zoom, &bounds);
        let tile = TileCoord { z: zoom, x: frac.x.floor() as u32, y: frac.y.floor() as u32 };
        let pixel = coord_to_pixel(&coord, &bounds);
        prop_assert!(tile_pixel_bounds(&tile).contains(&pixel));
    }
}
