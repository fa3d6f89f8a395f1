//! `tilesmith coord`: show where a geographic point lands in the pyramid.

use crate::error::CliError;
use tilesmith::coord::{lon_lat_to_pixel, tile_pixel_bounds, to_tile_coords, LonLat, TileCoord};

/// Text printed for a point at a zoom level.
pub fn describe(lon: f64, lat: f64, zoom: u8) -> Result<String, CliError> {
    let tile: TileCoord = to_tile_coords(lat, lon, zoom)?;
    let pixel = lon_lat_to_pixel(&LonLat { lon, lat });
    let bounds = tile_pixel_bounds(&tile);

    Ok(format!(
        "Location: {}, {}\n\
         Tile:     {} (z/x/y)\n\
         Pixel:    {}, {} (of 2^32)\n\
         Bounds:   [{}, {}) x [{}, {})",
        lon,
        lat,
        tile,
        pixel.x,
        pixel.y,
        bounds.top_left.0,
        bounds.bottom_right.0,
        bounds.top_left.1,
        bounds.bottom_right.1,
    ))
}

pub fn run(lon: f64, lat: f64, zoom: u8) -> Result<(), CliError> {
    println!("{}", describe(lon, lat, zoom)?);
    Ok(())
}
