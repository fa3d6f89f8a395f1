//! Coordinate type definitions

use std::fmt;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Deepest pyramid level the pixel coordinate system can address.
pub const MAX_LEVEL_SUPPORTED: u8 = 24;

/// Bin resolution of a single tile along each axis.
pub const MAX_TILE_RESOLUTION: u32 = 256;

/// Number of pixels across either axis at [`MAX_LEVEL_SUPPORTED`].
///
/// `256 * 2^24 = 2^32`, so every clamped pixel coordinate fits in a `u32`
/// while pixel arithmetic stays in `u64`.
pub const MAX_PIXELS: u64 = (MAX_TILE_RESOLUTION as u64) << MAX_LEVEL_SUPPORTED;

/// A node of the tile pyramid.
///
/// The origin is the top-left corner: `x` grows eastward (or toward
/// [`Bounds::right`]) and `y` grows southward (or toward [`Bounds::bottom`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Zoom level (0-24)
    pub z: u8,
    /// Column, 0 at the left edge
    pub x: u32,
    /// Row, 0 at the top edge
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile coordinate, validating the level and both indices.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if z > MAX_LEVEL_SUPPORTED {
            return Err(CoordError::InvalidZoom(z));
        }
        let dim = 1u64 << z;
        if u64::from(x) >= dim || u64::from(y) >= dim {
            return Err(CoordError::TileOutOfRange { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Whether the level and both indices are inside the pyramid.
    ///
    /// Always true for coordinates built by [`TileCoord::new`]; the fields
    /// are public, so values assembled by hand may not be.
    pub fn is_valid(&self) -> bool {
        self.z <= MAX_LEVEL_SUPPORTED && u64::from(self.x) < self.dim() && u64::from(self.y) < self.dim()
    }

    /// Number of tiles along either axis at this tile's level.
    ///
    /// Saturates at `u64::MAX` for levels of 64 and above.
    #[inline]
    pub fn dim(&self) -> u64 {
        1u64.checked_shl(u32::from(self.z)).unwrap_or(u64::MAX)
    }

    /// The four tiles one level deeper, in row-major order.
    ///
    /// Returns `None` at [`MAX_LEVEL_SUPPORTED`] and for invalid coordinates.
    pub fn children(&self) -> Option<[TileCoord; 4]> {
        if self.z >= MAX_LEVEL_SUPPORTED || !self.is_valid() {
            return None;
        }
        let (z, x, y) = (self.z + 1, self.x * 2, self.y * 2);
        Some([
            TileCoord { z, x, y },
            TileCoord { z, x: x + 1, y },
            TileCoord { z, x, y: y + 1 },
            TileCoord {
                z,
                x: x + 1,
                y: y + 1,
            },
        ])
    }

    /// The enclosing tile one level up, or `None` at level 0.
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord {
            z: self.z - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// A point at maximum pyramid resolution.
///
/// Always within `[0, MAX_PIXELS - 1]` on both axes; constructors clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelCoord {
    pub x: u64,
    pub y: u64,
}

impl PixelCoord {
    /// Creates a pixel coordinate, clamping both axes into range.
    #[inline]
    pub fn new(x: u64, y: u64) -> Self {
        Self {
            x: x.min(MAX_PIXELS - 1),
            y: y.min(MAX_PIXELS - 1),
        }
    }
}

/// The pixel-space rectangle covered by one tile.
///
/// `bottom_right` is exclusive: it is the top-left pixel of the diagonal
/// neighbour, or `MAX_PIXELS` on the last row/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub top_left: (u64, u64),
    pub bottom_right: (u64, u64),
}

impl PixelBounds {
    /// Returns true if the pixel lies inside these bounds.
    pub fn contains(&self, pixel: &PixelCoord) -> bool {
        pixel.x >= self.top_left.0
            && pixel.x < self.bottom_right.0
            && pixel.y >= self.top_left.1
            && pixel.y < self.bottom_right.1
    }
}

/// Source-data envelope used to normalize cartesian input.
///
/// `top` maps to normalized `v = 0`. Either axis may be inverted
/// (`top < bottom` for screen-style data, `top > bottom` for y-up data).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl Bounds {
    pub fn new(left: f64, right: f64, bottom: f64, top: f64) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
        }
    }
}

/// A cartesian data coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

/// Real-valued tile coordinates at some zoom level.
///
/// The integer part is the tile index, the fractional part the position
/// inside that tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractionalTile {
    pub x: f64,
    pub y: f64,
}

/// Errors that can occur during strict coordinate conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Latitude is outside valid range (-85.05112878 to 85.05112878)
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180.0 to 180.0)
    InvalidLongitude(f64),
    /// Zoom level is outside valid range (0 to 24)
    InvalidZoom(u8),
    /// Tile index does not exist at the given level
    TileOutOfRange { z: u8, x: u32, y: u32 },
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidLatitude(lat) => {
                write!(
                    f,
                    "Invalid latitude: {} (must be between {} and {})",
                    lat, MIN_LAT, MAX_LAT
                )
            }
            CoordError::InvalidLongitude(lon) => {
                write!(
                    f,
                    "Invalid longitude: {} (must be between {} and {})",
                    lon, MIN_LON, MAX_LON
                )
            }
            CoordError::InvalidZoom(zoom) => {
                write!(
                    f,
                    "Invalid zoom level: {} (must be between 0 and {})",
                    zoom, MAX_LEVEL_SUPPORTED
                )
            }
            CoordError::TileOutOfRange { z, x, y } => {
                write!(
                    f,
                    "Invalid tile {}/{}/{}: indices must be below 2^{}",
                    z, x, y, z
                )
            }
        }
    }
}

impl std::error::Error for CoordError {}
