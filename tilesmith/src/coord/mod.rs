//! Tile pyramid coordinate system.
//!
//! Every conversion funnels through the unit square: geographic input is
//! projected with Web Mercator, cartesian input is rescaled against its
//! [`Bounds`], and the resulting `(u, v)` in `[0, 1]²` is scaled to pixels
//! or fractional tiles. `(0, 0)` is the top-left corner for both kinds of
//! data.
//!
//! Apart from the strict [`to_tile_coords`] and [`TileCoord::new`], all
//! functions are total: out-of-range input is clamped, never rejected.

mod types;

#[cfg(test)]
mod tests;

pub use types::{
    Bounds, Coord, CoordError, FractionalTile, LonLat, PixelBounds, PixelCoord, TileCoord,
    MAX_LAT, MAX_LEVEL_SUPPORTED, MAX_LON, MAX_PIXELS, MAX_TILE_RESOLUTION, MIN_LAT, MIN_LON,
};

use std::f64::consts::PI;

/// Rescales a cartesian point into the unit square.
///
/// Values outside `bounds` land outside `[0, 1]`; callers that need a pixel
/// go through [`to_pixel`], which clamps. A degenerate axis maps to 0.
#[inline]
pub fn normalize(coord: &Coord, bounds: &Bounds) -> (f64, f64) {
    (
        rescale(coord.x, bounds.left, bounds.right),
        rescale(coord.y, bounds.top, bounds.bottom),
    )
}

fn rescale(value: f64, from: f64, to: f64) -> f64 {
    let span = to - from;
    if span == 0.0 {
        return 0.0;
    }
    (value - from) / span
}

/// Projects a geographic point into the unit square (Web Mercator).
///
/// Latitude is clamped to the Mercator limits and longitude to ±180, so the
/// result is always inside `[0, 1]²`.
#[inline]
pub fn normalize_lon_lat(lon_lat: &LonLat) -> (f64, f64) {
    let lon = lon_lat.lon.clamp(MIN_LON, MAX_LON);
    let lat = lon_lat.lat.clamp(MIN_LAT, MAX_LAT);
    let u = (lon + 180.0) / 360.0;
    let lat_rad = lat * PI / 180.0;
    let v = (1.0 - lat_rad.tan().asinh() / PI) / 2.0;
    (u, v.clamp(0.0, 1.0))
}

/// Maps a normalized position to a pixel at maximum resolution.
///
/// `floor(value * MAX_PIXELS)` clamped to `[0, MAX_PIXELS - 1]`. NaN maps
/// to 0.
#[inline]
pub fn to_pixel(u: f64, v: f64) -> PixelCoord {
    PixelCoord::new(scale_to_pixels(u), scale_to_pixels(v))
}

fn scale_to_pixels(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let scaled = (value * MAX_PIXELS as f64).floor();
    if scaled >= (MAX_PIXELS - 1) as f64 {
        MAX_PIXELS - 1
    } else {
        scaled as u64
    }
}

/// Translates a cartesian coordinate to a pixel coordinate.
pub fn coord_to_pixel(coord: &Coord, bounds: &Bounds) -> PixelCoord {
    let (u, v) = normalize(coord, bounds);
    to_pixel(u, v)
}

/// Translates a geographic coordinate to a pixel coordinate.
pub fn lon_lat_to_pixel(lon_lat: &LonLat) -> PixelCoord {
    let (u, v) = normalize_lon_lat(lon_lat);
    to_pixel(u, v)
}

/// Returns the pixel rectangle covered by a tile.
///
/// Each edge is `index / 2^z` scaled by [`MAX_PIXELS`] and rounded to the
/// nearest pixel. Edges of out-of-range coordinates are clamped to
/// `MAX_PIXELS`.
pub fn tile_pixel_bounds(tile: &TileCoord) -> PixelBounds {
    let pow2 = tile.dim() as f64;
    let max = MAX_PIXELS as f64;
    let edge = |index: f64| ((index / pow2).min(1.0) * max).round() as u64;
    let (x, y) = (f64::from(tile.x), f64::from(tile.y));
    PixelBounds {
        top_left: (edge(x), edge(y)),
        bottom_right: (edge(x + 1.0), edge(y + 1.0)),
    }
}

/// Real-valued tile coordinates of a cartesian point at `zoom`.
pub fn fractional_tile(coord: &Coord, zoom: u8, bounds: &Bounds) -> FractionalTile {
    let (u, v) = normalize(coord, bounds);
    scale_to_zoom(u, v, zoom)
}

/// Real-valued tile coordinates of a geographic point at `zoom`.
pub fn lon_lat_to_fractional_tile(lon_lat: &LonLat, zoom: u8) -> FractionalTile {
    let (u, v) = normalize_lon_lat(lon_lat);
    scale_to_zoom(u, v, zoom)
}

fn scale_to_zoom(u: f64, v: f64, zoom: u8) -> FractionalTile {
    let n = (1u64 << zoom.min(MAX_LEVEL_SUPPORTED)) as f64;
    FractionalTile { x: u * n, y: v * n }
}

/// Position of a point relative to a tile, in tile-local pixels.
///
/// Points inside the tile fall in `[0, 256)` on both axes; points outside
/// it are not clamped, so callers can still decide what to do with them.
/// `point` must have been computed at the tile's zoom level.
pub fn tile_local_pixel(point: &FractionalTile, tile: &TileCoord) -> (f64, f64) {
    let res = f64::from(MAX_TILE_RESOLUTION);
    (
        (point.x - f64::from(tile.x)) * res,
        (point.y - f64::from(tile.y)) * res,
    )
}

/// Bin `(column, row)` of a point inside a tile binned at `resolution`.
///
/// Returns `None` when the point lies outside the tile or the resolution
/// is zero.
pub fn bin_index(point: &FractionalTile, tile: &TileCoord, resolution: u32) -> Option<(u32, u32)> {
    if resolution == 0 {
        return None;
    }
    let local_x = point.x - f64::from(tile.x);
    let local_y = point.y - f64::from(tile.y);
    if !(0.0..1.0).contains(&local_x) || !(0.0..1.0).contains(&local_y) {
        return None;
    }
    let res = f64::from(resolution);
    let col = ((local_x * res).floor() as u32).min(resolution - 1);
    let row = ((local_y * res).floor() as u32).min(resolution - 1);
    Some((col, row))
}

/// Tile-local pixel position of the centre of bin `index` (row-major).
pub fn bin_center(index: usize, resolution: u32) -> (f32, f32) {
    let res = resolution.max(1) as usize;
    let bin_size = f64::from(MAX_TILE_RESOLUTION) / res as f64;
    let half = bin_size / 2.0;
    let x = (index % res) as f64 * bin_size + half;
    let y = (index / res) as f64 * bin_size + half;
    (x as f32, y as f32)
}

/// Converts geographic coordinates to tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 24)
///
/// # Returns
///
/// A `Result` containing the tile coordinates or an error if inputs are invalid.
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_LEVEL_SUPPORTED {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let tile = lon_lat_to_fractional_tile(&LonLat { lon, lat }, zoom);
    let last = ((1u64 << zoom) - 1) as u32;

    // lon = 180 sits on the far edge; keep it in the last column
    let x = (tile.x.floor() as u32).min(last);
    let y = (tile.y.floor() as u32).min(last);

    Ok(TileCoord { z: zoom, x, y })
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the longitude/latitude of the tile's north-west corner.
#[inline]
pub fn tile_to_lon_lat(tile: &TileCoord) -> LonLat {
    let n = tile.dim() as f64;

    let lon = f64::from(tile.x) / n * 360.0 - 180.0;

    // Inverse Web Mercator
    let y = f64::from(tile.y) / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    LonLat { lon, lat }
}
