//! Generators that compute tiles directly from a [`QueryBackend`].

use super::backend::{field, BinRequest, Bivariate, HitRequest, QueryBackend};
use super::{Generator, TileDefaults};
use crate::coord::{bin_center, tile_local_pixel, TileCoord};
use crate::error::{TileError, TileResult};
use crate::lod::{Edge, Encoding, Point};
use crate::params::{self, Params};
use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Default cap on documents fetched for an edge tile.
pub const DEFAULT_EDGE_LIMIT: usize = 10_000;

/// Default document count up to which a micro tile returns its hits.
pub const DEFAULT_MICRO_THRESHOLD: usize = 1_000;

/// Default number of terms in a top terms tile.
pub const DEFAULT_TERMS_SIZE: usize = 10;

fn unparsed(id: &str) -> TileError {
    TileError::config(format!("{} generator used before its parameters were parsed", id))
}

/// Matching documents in the tile, from a one-bin count.
async fn tile_count<B: QueryBackend>(
    backend: &B,
    uri: &str,
    fields: &Bivariate,
    coord: &TileCoord,
    query: Option<&Value>,
) -> TileResult<u64> {
    let bins = backend.bins(uri, bin_request(fields, None, 1, coord, query)).await?;
    Ok(bins.first().copied().flatten().unwrap_or(0.0) as u64)
}

fn bin_request(
    fields: &Bivariate,
    value_field: Option<&String>,
    resolution: u32,
    coord: &TileCoord,
    query: Option<&Value>,
) -> BinRequest {
    BinRequest {
        coord: *coord,
        fields: fields.clone(),
        value_field: value_field.cloned(),
        resolution,
        query: query.cloned(),
    }
}

// ============================================================================
// Heatmap
// ============================================================================

#[derive(Debug, Clone)]
struct HeatmapParams {
    fields: Bivariate,
    value_field: Option<String>,
    resolution: u32,
}

/// `resolution²` little-endian f32 bins, row-major from the top-left.
///
/// Parameters: `xField`, `yField`, optional `valueField` (summed instead of
/// counting), `resolution`, optional `bounds` for cartesian data.
pub struct HeatmapGenerator<B> {
    backend: Arc<B>,
    defaults: TileDefaults,
    params: Option<HeatmapParams>,
}

impl<B: QueryBackend> HeatmapGenerator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_defaults(backend, TileDefaults::default())
    }

    pub fn with_defaults(backend: Arc<B>, defaults: TileDefaults) -> Self {
        Self {
            backend,
            defaults,
            params: None,
        }
    }
}

impl<B: QueryBackend> Generator for HeatmapGenerator<B> {
    fn id(&self) -> &str {
        "heatmap"
    }

    fn parse(&mut self, params: &Params) -> TileResult<()> {
        self.params = Some(HeatmapParams {
            fields: Bivariate::parse(params)?,
            value_field: params::optional_str(params, "valueField")?.map(str::to_string),
            resolution: params::resolution_or(params, "resolution", self.defaults.resolution)?,
        });
        Ok(())
    }

    async fn create(&self, uri: &str, coord: &TileCoord, query: Option<&Value>) -> TileResult<Bytes> {
        let p = self.params.as_ref().ok_or_else(|| unparsed(self.id()))?;
        let request = bin_request(&p.fields, p.value_field.as_ref(), p.resolution, coord, query);
        let bins = self.backend.bins(uri, request).await?;

        let mut out = Vec::with_capacity(bins.len() * 4);
        for bin in bins {
            out.extend_from_slice(&(bin.unwrap_or(0.0) as f32).to_le_bytes());
        }
        Ok(Bytes::from(out))
    }
}

// ============================================================================
// Macro (points)
// ============================================================================

#[derive(Debug, Clone)]
struct MacroParams {
    fields: Bivariate,
    resolution: u32,
    encoding: Encoding,
}

/// One point at the centre of every non-empty bin, plain or LOD encoded.
///
/// Parameters: `xField`, `yField`, `resolution`, `lod` (0 for plain).
pub struct MacroGenerator<B> {
    backend: Arc<B>,
    defaults: TileDefaults,
    params: Option<MacroParams>,
}

impl<B: QueryBackend> MacroGenerator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_defaults(backend, TileDefaults::default())
    }

    pub fn with_defaults(backend: Arc<B>, defaults: TileDefaults) -> Self {
        Self {
            backend,
            defaults,
            params: None,
        }
    }
}

impl<B: QueryBackend> Generator for MacroGenerator<B> {
    fn id(&self) -> &str {
        "macro"
    }

    fn parse(&mut self, params: &Params) -> TileResult<()> {
        self.params = Some(MacroParams {
            fields: Bivariate::parse(params)?,
            resolution: params::resolution_or(params, "resolution", self.defaults.resolution)?,
            encoding: Encoding::from_lod(params::lod_or(params, "lod", self.defaults.lod)?),
        });
        Ok(())
    }

    async fn create(&self, uri: &str, coord: &TileCoord, query: Option<&Value>) -> TileResult<Bytes> {
        let p = self.params.as_ref().ok_or_else(|| unparsed(self.id()))?;
        let request = bin_request(&p.fields, None, p.resolution, coord, query);
        let bins = self.backend.bins(uri, request).await?;

        let points: Vec<Point> = bins
            .iter()
            .enumerate()
            .filter(|(_, bin)| bin.is_some())
            .map(|(index, _)| {
                let (x, y) = bin_center(index, p.resolution);
                Point { x, y }
            })
            .collect();
        Ok(Bytes::from(p.encoding.encode(&points)))
    }
}

// ============================================================================
// Edges
// ============================================================================

#[derive(Debug, Clone)]
struct EdgeParams {
    src: Bivariate,
    dst: Bivariate,
    weight_field: Option<String>,
    limit: usize,
    encoding: Encoding,
}

/// Edges whose source lies in the tile, as tile-local pixel positions.
///
/// Parameters: `srcXField`, `srcYField`, `dstXField`, `dstYField`,
/// optional `weightField` (weight 1 otherwise), `size` (document cap) and
/// `lod`.
pub struct EdgeGenerator<B> {
    backend: Arc<B>,
    defaults: TileDefaults,
    params: Option<EdgeParams>,
}

impl<B: QueryBackend> EdgeGenerator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_defaults(backend, TileDefaults::default())
    }

    pub fn with_defaults(backend: Arc<B>, defaults: TileDefaults) -> Self {
        Self {
            backend,
            defaults,
            params: None,
        }
    }

    fn edge(p: &EdgeParams, coord: &TileCoord, hit: &Value) -> TileResult<Edge> {
        let endpoint = |fields: &Bivariate, name: &str| {
            fields
                .locate(hit, coord.z)
                .map(|point| tile_local_pixel(&point, coord))
                .ok_or_else(|| {
                    TileError::backend(format!("could not parse edge {} position from hit: {}", name, hit))
                })
        };
        let (src_x, src_y) = endpoint(&p.src, "source")?;
        let (dst_x, dst_y) = endpoint(&p.dst, "destination")?;
        let weight = match &p.weight_field {
            Some(name) => field(hit, name).and_then(Value::as_f64).ok_or_else(|| {
                TileError::backend(format!("could not parse edge weight from hit: {}", hit))
            })?,
            None => 1.0,
        };
        Ok(Edge::new(src_x as f32, src_y as f32, dst_x as f32, dst_y as f32).with_weight(weight as f32))
    }
}

impl<B: QueryBackend> Generator for EdgeGenerator<B> {
    fn id(&self) -> &str {
        "edge"
    }

    fn parse(&mut self, params: &Params) -> TileResult<()> {
        self.params = Some(EdgeParams {
            src: Bivariate::parse_prefixed(params, "src")?,
            dst: Bivariate::parse_prefixed(params, "dst")?,
            weight_field: params::optional_str(params, "weightField")?.map(str::to_string),
            limit: params::usize_or(params, "size", DEFAULT_EDGE_LIMIT)?,
            encoding: Encoding::from_lod(params::lod_or(params, "lod", self.defaults.lod)?),
        });
        Ok(())
    }

    async fn create(&self, uri: &str, coord: &TileCoord, query: Option<&Value>) -> TileResult<Bytes> {
        let p = self.params.as_ref().ok_or_else(|| unparsed(self.id()))?;
        let request = HitRequest {
            coord: *coord,
            fields: p.src.clone(),
            query: query.cloned(),
            limit: p.limit,
        };
        let hits = self.backend.hits(uri, request).await?;

        let edges = hits
            .iter()
            .map(|hit| Self::edge(p, coord, hit))
            .collect::<TileResult<Vec<Edge>>>()?;
        Ok(Bytes::from(p.encoding.encode(&edges)))
    }
}

// ============================================================================
// Count
// ============================================================================

/// Number of matching documents in the tile, as `{"count":N}`.
pub struct CountGenerator<B> {
    backend: Arc<B>,
    fields: Option<Bivariate>,
}

impl<B: QueryBackend> CountGenerator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            fields: None,
        }
    }
}

impl<B: QueryBackend> Generator for CountGenerator<B> {
    fn id(&self) -> &str {
        "count"
    }

    fn parse(&mut self, params: &Params) -> TileResult<()> {
        self.fields = Some(Bivariate::parse(params)?);
        Ok(())
    }

    async fn create(&self, uri: &str, coord: &TileCoord, query: Option<&Value>) -> TileResult<Bytes> {
        let fields = self.fields.as_ref().ok_or_else(|| unparsed(self.id()))?;
        let count = tile_count(self.backend.as_ref(), uri, fields, coord, query).await?;
        Ok(Bytes::from(json!({ "count": count }).to_string()))
    }
}

// ============================================================================
// Micro (top hits)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
struct MicroParams {
    fields: Bivariate,
    threshold: usize,
    hits_count: usize,
    sort_field: Option<String>,
    sort_order: SortOrder,
    include_fields: Option<Vec<String>>,
}

/// The tile's documents as a JSON array, or an empty tile when more than
/// `threshold` documents match.
///
/// Parameters: `xField`, `yField`, `threshold`, `hitsCount` (required),
/// optional `sortField` with `sortOrder` (`desc` or `asc`) and
/// `includeFields` (top-level keys kept in each document).
pub struct MicroGenerator<B> {
    backend: Arc<B>,
    params: Option<MicroParams>,
}

impl<B: QueryBackend> MicroGenerator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            params: None,
        }
    }

    fn project(include: &[String], hit: Value) -> Value {
        match hit {
            Value::Object(mut doc) => {
                doc.retain(|key, _| include.iter().any(|name| name == key));
                Value::Object(doc)
            }
            other => other,
        }
    }
}

/// Numbers before strings, anything else last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(_)), _) => Ordering::Less,
        (_, Some(Value::Number(_))) => Ordering::Greater,
        (Some(Value::String(_)), _) => Ordering::Less,
        (_, Some(Value::String(_))) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

impl<B: QueryBackend> Generator for MicroGenerator<B> {
    fn id(&self) -> &str {
        "micro"
    }

    fn parse(&mut self, params: &Params) -> TileResult<()> {
        let sort_order = match params::optional_str(params, "sortOrder")? {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(_) => {
                return Err(TileError::config("`sortOrder` must be either `desc` or `asc`"));
            }
        };
        self.params = Some(MicroParams {
            fields: Bivariate::parse(params)?,
            threshold: params::usize_or(params, "threshold", DEFAULT_MICRO_THRESHOLD)?,
            hits_count: params::require_usize(params, "hitsCount")?,
            sort_field: params::optional_str(params, "sortField")?.map(str::to_string),
            sort_order,
            include_fields: params::optional_str_array(params, "includeFields")?,
        });
        Ok(())
    }

    async fn create(&self, uri: &str, coord: &TileCoord, query: Option<&Value>) -> TileResult<Bytes> {
        let p = self.params.as_ref().ok_or_else(|| unparsed(self.id()))?;
        let total = tile_count(self.backend.as_ref(), uri, &p.fields, coord, query).await?;
        if total > p.threshold as u64 {
            return Ok(Bytes::new());
        }

        let request = HitRequest {
            coord: *coord,
            fields: p.fields.clone(),
            query: query.cloned(),
            limit: p.threshold,
        };
        let mut hits = self.backend.hits(uri, request).await?;
        if let Some(name) = &p.sort_field {
            hits.sort_by(|a, b| {
                let order = compare_values(field(a, name), field(b, name));
                match p.sort_order {
                    SortOrder::Asc => order,
                    // documents without the field stay last
                    SortOrder::Desc => match (field(a, name), field(b, name)) {
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        _ => order.reverse(),
                    },
                }
            });
        }
        hits.truncate(p.hits_count);

        let hits: Vec<Value> = match &p.include_fields {
            Some(include) => hits.into_iter().map(|hit| Self::project(include, hit)).collect(),
            None => hits,
        };
        Ok(Bytes::from(serde_json::to_vec(&hits)?))
    }
}

// ============================================================================
// Top terms
// ============================================================================

#[derive(Debug, Clone)]
struct TopTermsParams {
    fields: Bivariate,
    field: String,
    size: usize,
}

/// The most frequent values of a string field in the tile, as a JSON object
/// of term to document count.
///
/// Parameters: `xField`, `yField` and `top_terms: {field, size}`. Array
/// fields count each of their strings.
pub struct TopTermsGenerator<B> {
    backend: Arc<B>,
    params: Option<TopTermsParams>,
}

impl<B: QueryBackend> TopTermsGenerator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            params: None,
        }
    }
}

impl<B: QueryBackend> Generator for TopTermsGenerator<B> {
    fn id(&self) -> &str {
        "top_terms"
    }

    fn parse(&mut self, params: &Params) -> TileResult<()> {
        let terms = params::require_object(params, "top_terms")?;
        self.params = Some(TopTermsParams {
            fields: Bivariate::parse(params)?,
            field: params::require_str(terms, "field")?.to_string(),
            size: params::usize_or(terms, "size", DEFAULT_TERMS_SIZE)?,
        });
        Ok(())
    }

    async fn create(&self, uri: &str, coord: &TileCoord, query: Option<&Value>) -> TileResult<Bytes> {
        let p = self.params.as_ref().ok_or_else(|| unparsed(self.id()))?;
        let request = HitRequest {
            coord: *coord,
            fields: p.fields.clone(),
            query: query.cloned(),
            limit: usize::MAX,
        };
        let hits = self.backend.hits(uri, request).await?;

        let mut counts: HashMap<&str, u64> = HashMap::new();
        for hit in &hits {
            match field(hit, &p.field) {
                Some(Value::String(term)) => *counts.entry(term).or_default() += 1,
                Some(Value::Array(values)) => {
                    for term in values.iter().filter_map(Value::as_str) {
                        *counts.entry(term).or_default() += 1;
                    }
                }
                _ => {}
            }
        }

        let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(p.size);

        let terms: Map<String, Value> = ranked
            .into_iter()
            .map(|(term, count)| (term.to_string(), Value::from(count)))
            .collect();
        Ok(Bytes::from(serde_json::to_vec(&terms)?))
    }
}
