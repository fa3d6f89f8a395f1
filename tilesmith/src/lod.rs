//! Level-of-detail encoding for point and edge tiles.
//!
//! Records are ordered along a Morton (Z-order) curve so that spatially
//! close records sit close together in the buffer, and a per-level offset
//! table tells the client how much of the sorted buffer to consume for a
//! given level of detail.
//!
//! # Layout
//!
//! All values are little-endian.
//!
//! ```text
//! plain point tile:  f32[2N]                      (x, y)
//! plain edge tile:   f32[6N]                      (srcX, srcY, w, dstX, dstY, w)
//! LOD tile:          u32 count
//!                    u32 offsets[L]
//!                    records[count]               (same record layout as plain)
//! ```
//!
//! Record coordinates are tile-local pixels in `[0, 256)`.

use crate::coord::MAX_TILE_RESOLUTION;
use thiserror::Error;

/// Bits of precision per axis when quantizing a position for its Morton code.
const MORTON_AXIS_BITS: u32 = 16;

/// Largest offset table an LOD tile carries.
///
/// One level per bit of the Morton code plus the final record count; finer
/// tables cannot split the curve any further.
pub const MAX_LOD: usize = 2 * MORTON_AXIS_BITS as usize + 1;

/// A point in tile-local pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// A weighted edge in tile-local pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub src_x: f32,
    pub src_y: f32,
    pub dst_x: f32,
    pub dst_y: f32,
    pub weight: f32,
}

impl Edge {
    /// Creates an edge with a weight of 1.
    pub fn new(src_x: f32, src_y: f32, dst_x: f32, dst_y: f32) -> Self {
        Self {
            src_x,
            src_y,
            dst_x,
            dst_y,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

/// A fixed-size record that can be LOD-encoded.
pub trait LodRecord: Sized {
    /// Number of f32 values per encoded record.
    const FLOATS: usize;

    /// The position that determines the record's place on the curve.
    fn anchor(&self) -> (f32, f32);

    /// Appends the record's floats to `out`.
    fn write(&self, out: &mut Vec<u8>);

    /// Reads a record from exactly [`Self::FLOATS`] floats.
    fn read(floats: &[f32]) -> Self;
}

impl LodRecord for Point {
    const FLOATS: usize = 2;

    fn anchor(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_f32s(out, &[self.x, self.y]);
    }

    fn read(floats: &[f32]) -> Self {
        Self {
            x: floats[0],
            y: floats[1],
        }
    }
}

impl LodRecord for Edge {
    const FLOATS: usize = 6;

    /// Edges are ordered by their source endpoint.
    fn anchor(&self) -> (f32, f32) {
        (self.src_x, self.src_y)
    }

    fn write(&self, out: &mut Vec<u8>) {
        // weight is repeated so each endpoint renders on its own
        put_f32s(
            out,
            &[
                self.src_x,
                self.src_y,
                self.weight,
                self.dst_x,
                self.dst_y,
                self.weight,
            ],
        );
    }

    fn read(floats: &[f32]) -> Self {
        Self {
            src_x: floats[0],
            src_y: floats[1],
            weight: floats[2],
            dst_x: floats[3],
            dst_y: floats[4],
        }
    }
}

fn put_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// How a point/edge tile is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Flat record array, input order
    #[default]
    Plain,
    /// Morton-sorted records with an offset table of this many levels
    Lod(usize),
}

impl Encoding {
    /// Maps the `lod` request parameter onto an encoding (0 = plain).
    pub fn from_lod(lod: usize) -> Self {
        if lod == 0 {
            Self::Plain
        } else {
            Self::Lod(lod)
        }
    }

    /// Encodes records with this encoding.
    pub fn encode<R: LodRecord>(&self, records: &[R]) -> Vec<u8> {
        match self {
            Self::Plain => encode_plain(records),
            Self::Lod(levels) => encode_lod(records, *levels),
        }
    }
}

/// Errors decoding an LOD buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LodError {
    #[error("LOD buffer truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("LOD buffer has {0} trailing bytes that do not form an offset table")]
    Misaligned(usize),
}

/// A decoded LOD buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct LodBuffer<R> {
    pub offsets: Vec<u32>,
    pub records: Vec<R>,
}

/// Quantizes a tile-local pixel coordinate to 16 bits.
fn quantize(value: f32) -> u32 {
    let normalized = f64::from(value) / f64::from(MAX_TILE_RESOLUTION);
    if normalized.is_nan() || normalized <= 0.0 {
        return 0;
    }
    let max = 1u32 << MORTON_AXIS_BITS;
    if normalized >= 1.0 {
        return max - 1;
    }
    ((normalized * f64::from(max)) as u32).min(max - 1)
}

/// Spreads the low 16 bits of `v` onto the even bit positions.
fn spread_bits(v: u32) -> u32 {
    let mut v = v & 0x0000_FFFF;
    v = (v | (v << 8)) & 0x00FF_00FF;
    v = (v | (v << 4)) & 0x0F0F_0F0F;
    v = (v | (v << 2)) & 0x3333_3333;
    v = (v | (v << 1)) & 0x5555_5555;
    v
}

/// Morton code of a tile-local position.
///
/// X occupies the even bits and Y the odd bits, so the top two bits of the
/// code select the quadrant, the next two the sub-quadrant, and so on.
pub fn morton_code(x: f32, y: f32) -> u32 {
    spread_bits(quantize(x)) | (spread_bits(quantize(y)) << 1)
}

/// Per-level offsets into a Morton-sorted record array.
///
/// Level `l < L-1` holds the number of codes strictly below
/// `l * 2^32 / (L-1)`; the last level holds the record count. The table is
/// non-decreasing, starts at 0 (for `L > 1`) and ends at the record count.
pub fn lod_offsets(sorted_codes: &[u32], levels: usize) -> Vec<u32> {
    let count = sorted_codes.len() as u32;
    (0..levels)
        .map(|level| {
            if level + 1 == levels {
                return count;
            }
            let threshold = ((level as u64) << 32) / (levels as u64 - 1);
            sorted_codes.partition_point(|&code| u64::from(code) < threshold) as u32
        })
        .collect()
}

/// Orders records along the Morton curve.
///
/// The sort is stable: records with equal codes keep their input order.
pub fn sort_by_morton<R: LodRecord + Clone>(records: &[R]) -> (Vec<R>, Vec<u32>) {
    keyed_by_morton(records)
        .into_iter()
        .map(|(code, r)| (r.clone(), code))
        .unzip()
}

fn keyed_by_morton<R: LodRecord>(records: &[R]) -> Vec<(u32, &R)> {
    let mut keyed: Vec<(u32, &R)> = records
        .iter()
        .map(|r| {
            let (x, y) = r.anchor();
            (morton_code(x, y), r)
        })
        .collect();
    // stable: ties keep input order
    keyed.sort_by_key(|(code, _)| *code);
    keyed
}

/// Serializes records as a flat float array without reordering.
pub fn encode_plain<R: LodRecord>(records: &[R]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * R::FLOATS * 4);
    for record in records {
        record.write(&mut out);
    }
    out
}

/// Serializes records Morton-sorted with a `levels`-entry offset table.
///
/// `levels` is clamped to [`MAX_LOD`].
pub fn encode_lod<R: LodRecord>(records: &[R], levels: usize) -> Vec<u8> {
    let levels = levels.min(MAX_LOD);
    let keyed = keyed_by_morton(records);

    let codes: Vec<u32> = keyed.iter().map(|(code, _)| *code).collect();
    let offsets = lod_offsets(&codes, levels);

    let capacity = records
        .len()
        .checked_mul(R::FLOATS * 4)
        .and_then(|record_bytes| record_bytes.checked_add(4 + levels * 4))
        .unwrap_or(0);
    let mut out = Vec::with_capacity(capacity);
    out.extend_from_slice(&(records.len() as u32).to_le_bytes());
    for offset in &offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    for (_, record) in keyed {
        record.write(&mut out);
    }
    out
}

pub fn encode_points(points: &[Point]) -> Vec<u8> {
    encode_plain(points)
}

pub fn encode_edges(edges: &[Edge]) -> Vec<u8> {
    encode_plain(edges)
}

pub fn encode_points_lod(points: &[Point], levels: usize) -> Vec<u8> {
    encode_lod(points, levels)
}

pub fn encode_edges_lod(edges: &[Edge], levels: usize) -> Vec<u8> {
    encode_lod(edges, levels)
}

/// Decodes an LOD buffer, deriving the level count from its length.
pub fn decode_lod<R: LodRecord>(bytes: &[u8]) -> Result<LodBuffer<R>, LodError> {
    let count = read_u32(bytes, 0)? as usize;
    let record_bytes = count * R::FLOATS * 4;
    let table_bytes = bytes
        .len()
        .checked_sub(4 + record_bytes)
        .ok_or(LodError::Truncated {
            expected: 4 + record_bytes,
            actual: bytes.len(),
        })?;
    if table_bytes % 4 != 0 {
        return Err(LodError::Misaligned(table_bytes % 4));
    }

    let levels = table_bytes / 4;
    let offsets = (0..levels)
        .map(|i| read_u32(bytes, 4 + i * 4))
        .collect::<Result<Vec<_>, _>>()?;

    let floats: Vec<f32> = bytes[4 + table_bytes..]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let records = floats.chunks_exact(R::FLOATS).map(R::read).collect();

    Ok(LodBuffer { offsets, records })
}

pub fn decode_points_lod(bytes: &[u8]) -> Result<LodBuffer<Point>, LodError> {
    decode_lod(bytes)
}

pub fn decode_edges_lod(bytes: &[u8]) -> Result<LodBuffer<Edge>, LodError> {
    decode_lod(bytes)
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, LodError> {
    let slice = bytes.get(at..at + 4).ok_or(LodError::Truncated {
        expected: at + 4,
        actual: bytes.len(),
    })?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}
