//! Wire formats exchanged with the remote compute service.
//!
//! Outbound, one JSON [`Envelope`] per joint request. Inbound, a flat
//! concatenation of big-endian framed records:
//!
//! ```text
//! ┌────────────┬────────┬────────┬──────────────┬───────────────────┐
//! │ level: u64 │ x: u64 │ y: u64 │ size: u64    │ payload[size]     │ ... repeated
//! └────────────┴────────┴────────┴──────────────┴───────────────────┘
//! ```
//!
//! There is no record count and no padding; decoding scans until the buffer
//! is exhausted and any short read is fatal for the whole response.

use crate::coord::TileCoord;
use crate::error::TileError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Size of a record header: level, x, y and payload size.
pub const RECORD_HEADER_LEN: usize = 32;

/// Errors decoding a packed tile response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Fewer than 32 bytes left where a record header should start
    #[error("truncated record header at byte {offset}: {remaining} bytes left")]
    TruncatedHeader { offset: usize, remaining: usize },

    /// Declared payload runs past the end of the buffer
    #[error("payload at byte {offset} declares {declared} bytes but only {remaining} remain")]
    TruncatedPayload {
        offset: usize,
        declared: u64,
        remaining: usize,
    },

    /// Record addresses a tile that cannot exist
    #[error("record at byte {offset} has invalid tile {level}/{x}/{y}")]
    InvalidCoord {
        offset: usize,
        level: u64,
        x: u64,
        y: u64,
    },
}

impl From<WireError> for TileError {
    fn from(err: WireError) -> Self {
        TileError::Decode(err.to_string())
    }
}

/// One tile's payload from a packed response.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedTile {
    pub coord: TileCoord,
    pub data: Bytes,
}

/// One tile coordinate inside an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileSpec {
    pub level: u8,
    pub x: u32,
    pub y: u32,
}

impl From<&TileCoord> for TileSpec {
    fn from(coord: &TileCoord) -> Self {
        Self {
            level: coord.z,
            x: coord.x,
            y: coord.y,
        }
    }
}

/// The request sent to the remote service for one joint request.
///
/// `dataset` is the dataset's registered name, never its full configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub tile: Value,
    pub query: Option<Value>,
    pub dataset: String,
    #[serde(rename = "tile-specs")]
    pub tile_specs: Vec<TileSpec>,
}

impl Envelope {
    pub fn to_bytes(&self) -> Result<Bytes, TileError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TileError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Demultiplexing key for a tile coordinate.
///
/// `LL:X:Y` with the level padded to two digits and both indices padded to
/// the decimal width of `2^level`, so keys within a level sort lexically.
pub fn coord_key(level: u8, x: u64, y: u64) -> String {
    let digits = decimal_width(1u64 << level.min(63));
    format!("{:02}:{:0w$}:{:0w$}", level, x, y, w = digits)
}

/// [`coord_key`] for a tile coordinate.
pub fn tile_key(coord: &TileCoord) -> String {
    coord_key(coord.z, u64::from(coord.x), u64::from(coord.y))
}

fn decimal_width(mut n: u64) -> usize {
    let mut width = 1;
    while n >= 10 {
        n /= 10;
        width += 1;
    }
    width
}

/// Decodes a packed response into payloads keyed by [`coord_key`].
///
/// Payloads are zero-copy slices of `packed`. A later record for the same
/// coordinate replaces an earlier one.
pub fn decode_tiles(packed: Bytes) -> Result<HashMap<String, PackedTile>, WireError> {
    let total = packed.len();
    let mut buf = packed.clone();
    let mut tiles = HashMap::new();

    while buf.has_remaining() {
        let offset = total - buf.remaining();
        if buf.remaining() < RECORD_HEADER_LEN {
            return Err(WireError::TruncatedHeader {
                offset,
                remaining: buf.remaining(),
            });
        }
        let level = buf.get_u64();
        let x = buf.get_u64();
        let y = buf.get_u64();
        let size = buf.get_u64();

        if size > buf.remaining() as u64 {
            return Err(WireError::TruncatedPayload {
                offset,
                declared: size,
                remaining: buf.remaining(),
            });
        }
        let coord = validate_coord(offset, level, x, y)?;
        let data = buf.split_to(size as usize);

        tiles.insert(tile_key(&coord), PackedTile { coord, data });
    }

    Ok(tiles)
}

fn validate_coord(offset: usize, level: u64, x: u64, y: u64) -> Result<TileCoord, WireError> {
    let invalid = WireError::InvalidCoord {
        offset,
        level,
        x,
        y,
    };
    let (Ok(z), Ok(x), Ok(y)) = (u8::try_from(level), u32::try_from(x), u32::try_from(y)) else {
        return Err(invalid);
    };
    TileCoord::new(z, x, y).map_err(|_| invalid)
}

/// Packs tiles into the response format (the inverse of [`decode_tiles`]).
pub fn encode_tiles<'a>(tiles: impl IntoIterator<Item = (&'a TileCoord, &'a [u8])>) -> Bytes {
    let mut out = BytesMut::new();
    for (coord, data) in tiles {
        out.put_u64(u64::from(coord.z));
        out.put_u64(u64::from(coord.x));
        out.put_u64(u64::from(coord.y));
        out.put_u64(data.len() as u64);
        out.put_slice(data);
    }
    out.freeze()
}
