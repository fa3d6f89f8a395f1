//! Pluggable search backends queried by the direct generators.

use crate::coord::{
    bin_index, fractional_tile, lon_lat_to_fractional_tile, Bounds, Coord, FractionalTile,
    LonLat, TileCoord,
};
use crate::error::{TileError, TileResult};
use crate::params::{self, Params};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// How a document's two position fields map onto the tile pyramid.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `x` is longitude and `y` latitude, projected with Web Mercator
    Mercator,
    /// `x` and `y` are linear within these bounds
    Cartesian(Bounds),
}

impl Projection {
    /// Reads an optional `bounds` object; without one, data is geographic.
    pub fn parse(params: &Params) -> TileResult<Self> {
        let Some(bounds) = params.get("bounds") else {
            return Ok(Self::Mercator);
        };
        let edge = |key: &str| {
            bounds.get(key).and_then(Value::as_f64).ok_or_else(|| {
                TileError::config(format!("`bounds.{}` must be a number", key))
            })
        };
        Ok(Self::Cartesian(Bounds::new(
            edge("left")?,
            edge("right")?,
            edge("bottom")?,
            edge("top")?,
        )))
    }

    pub fn fractional_tile(&self, x: f64, y: f64, zoom: u8) -> FractionalTile {
        match self {
            Self::Mercator => lon_lat_to_fractional_tile(&LonLat { lon: x, lat: y }, zoom),
            Self::Cartesian(bounds) => fractional_tile(&Coord { x, y }, zoom, bounds),
        }
    }
}

/// The pair of document fields that position a point.
#[derive(Debug, Clone, PartialEq)]
pub struct Bivariate {
    pub x_field: String,
    pub y_field: String,
    pub projection: Projection,
}

impl Bivariate {
    /// Parses `<prefix>xField`/`<prefix>yField`, e.g. `srcXField` with prefix `src`.
    pub fn parse_prefixed(params: &Params, prefix: &str) -> TileResult<Self> {
        let key = |axis: &str| {
            if prefix.is_empty() {
                format!("{}Field", axis.to_lowercase())
            } else {
                format!("{}{}Field", prefix, axis)
            }
        };
        Ok(Self {
            x_field: params::require_str(params, &key("X"))?.to_string(),
            y_field: params::require_str(params, &key("Y"))?.to_string(),
            projection: Projection::parse(params)?,
        })
    }

    pub fn parse(params: &Params) -> TileResult<Self> {
        Self::parse_prefixed(params, "")
    }

    /// Position of `doc` at `zoom`, or `None` when either field is missing
    /// or not numeric.
    pub fn locate(&self, doc: &Value, zoom: u8) -> Option<FractionalTile> {
        let x = field(doc, &self.x_field)?.as_f64()?;
        let y = field(doc, &self.y_field)?.as_f64()?;
        Some(self.projection.fractional_tile(x, y, zoom))
    }
}

/// Looks up a dotted field path such as `pickup.x`.
pub fn field<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, key| value.get(key))
}

/// A binned aggregation over one tile.
#[derive(Debug, Clone)]
pub struct BinRequest {
    pub coord: TileCoord,
    pub fields: Bivariate,
    /// Sum this numeric field instead of counting documents
    pub value_field: Option<String>,
    pub resolution: u32,
    pub query: Option<Value>,
}

/// Documents positioned inside one tile.
#[derive(Debug, Clone)]
pub struct HitRequest {
    pub coord: TileCoord,
    pub fields: Bivariate,
    pub query: Option<Value>,
    pub limit: usize,
}

/// Search/aggregation backend.
pub trait QueryBackend: Send + Sync + 'static {
    /// Row-major `resolution²` bins; `None` marks a bin no document fell into.
    fn bins(
        &self,
        uri: &str,
        request: BinRequest,
    ) -> impl Future<Output = TileResult<Vec<Option<f64>>>> + Send;

    /// Up to `limit` matching documents inside the tile, in storage order.
    fn hits(&self, uri: &str, request: HitRequest)
        -> impl Future<Output = TileResult<Vec<Value>>> + Send;
}

/// In-process backend over JSON documents.
#[derive(Default)]
pub struct MemoryBackend {
    datasets: RwLock<HashMap<String, Arc<Vec<Value>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the documents stored under `uri`.
    pub fn insert(&self, uri: impl Into<String>, docs: Vec<Value>) {
        self.datasets.write().insert(uri.into(), Arc::new(docs));
    }

    pub fn len(&self, uri: &str) -> usize {
        self.datasets.read().get(uri).map_or(0, |docs| docs.len())
    }

    fn documents(&self, uri: &str) -> TileResult<Arc<Vec<Value>>> {
        self.datasets
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| TileError::backend(format!("no such dataset `{}`", uri)))
    }
}

impl QueryBackend for MemoryBackend {
    async fn bins(&self, uri: &str, request: BinRequest) -> TileResult<Vec<Option<f64>>> {
        let docs = self.documents(uri)?;
        let res = request.resolution as usize;
        let mut bins = vec![None; res * res];

        for doc in docs.iter() {
            if !matches_query(request.query.as_ref(), doc)? {
                continue;
            }
            let Some(point) = request.fields.locate(doc, request.coord.z) else {
                continue;
            };
            let Some((col, row)) = bin_index(&point, &request.coord, request.resolution) else {
                continue;
            };
            let amount = match &request.value_field {
                Some(name) => match field(doc, name).and_then(Value::as_f64) {
                    Some(value) => value,
                    None => continue,
                },
                None => 1.0,
            };
            let bin = &mut bins[row as usize * res + col as usize];
            *bin = Some(bin.unwrap_or(0.0) + amount);
        }

        debug!(
            uri,
            coord = %request.coord,
            filled = bins.iter().filter(|b| b.is_some()).count(),
            "Binned documents"
        );
        Ok(bins)
    }

    async fn hits(&self, uri: &str, request: HitRequest) -> TileResult<Vec<Value>> {
        let docs = self.documents(uri)?;
        let mut hits = Vec::new();
        for doc in docs.iter() {
            if hits.len() >= request.limit {
                break;
            }
            if !matches_query(request.query.as_ref(), doc)? {
                continue;
            }
            let inside = request
                .fields
                .locate(doc, request.coord.z)
                .and_then(|point| bin_index(&point, &request.coord, 1))
                .is_some();
            if inside {
                hits.push(doc.clone());
            }
        }
        Ok(hits)
    }
}

/// Evaluates a query expression against a document.
///
/// Supported forms:
/// - `{"equals": {"field": F, "value": V}}`
/// - `{"range": {"field": F, "gte": a, "gt": b, "lte": c, "lt": d}}`
/// - `{"and": [q, ...]}`, `{"or": [q, ...]}`, `{"not": q}`
pub fn matches_query(query: Option<&Value>, doc: &Value) -> TileResult<bool> {
    let Some(query) = query else {
        return Ok(true);
    };
    let Some((op, arg)) = query.as_object().and_then(single_entry) else {
        return Err(TileError::config(format!(
            "query must be an object with one operator: {}",
            query
        )));
    };

    match op.as_str() {
        "equals" => {
            let name = operand_field(arg)?;
            let expected = arg
                .get("value")
                .ok_or_else(|| TileError::config("`equals` requires a `value`"))?;
            Ok(field(doc, name) == Some(expected))
        }
        "range" => {
            let name = operand_field(arg)?;
            let Some(value) = field(doc, name).and_then(Value::as_f64) else {
                return Ok(false);
            };
            let bound = |key: &str| arg.get(key).and_then(Value::as_f64);
            Ok(bound("gte").map_or(true, |b| value >= b)
                && bound("gt").map_or(true, |b| value > b)
                && bound("lte").map_or(true, |b| value <= b)
                && bound("lt").map_or(true, |b| value < b))
        }
        "and" | "or" => {
            let clauses = arg
                .as_array()
                .ok_or_else(|| TileError::config(format!("`{}` requires an array", op)))?;
            let mut results = clauses.iter().map(|q| matches_query(Some(q), doc));
            if op == "and" {
                results.try_fold(true, |acc, r| r.map(|m| acc && m))
            } else {
                results.try_fold(false, |acc, r| r.map(|m| acc || m))
            }
        }
        "not" => Ok(!matches_query(Some(arg), doc)?),
        other => Err(TileError::config(format!("unsupported query operator `{}`", other))),
    }
}

fn single_entry(map: &serde_json::Map<String, Value>) -> Option<(&String, &Value)> {
    if map.len() == 1 {
        map.iter().next()
    } else {
        None
    }
}

fn operand_field(arg: &Value) -> TileResult<&str> {
    arg.get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| TileError::config("query operand requires a `field`"))
}
