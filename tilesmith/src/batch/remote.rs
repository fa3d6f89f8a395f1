//! The remote compute service and the tile kinds it produces.

use crate::coord::TileCoord;
use crate::error::{TileError, TileResult};
use crate::params::{self, Params};
use bytes::Bytes;
use serde_json::{json, Value};
use std::future::Future;

/// Connection to the remote compute service.
///
/// Any error returned here is a transport failure and fails every tile of
/// the joint request that made the call.
pub trait RemoteCompute: Send + Sync + 'static {
    /// Sends a dataset configuration blob to the service.
    fn register_dataset(&self, config: &str) -> impl Future<Output = TileResult<()>> + Send;

    /// Sends a JSON [`Envelope`](super::wire::Envelope) and returns the
    /// packed tile response.
    fn query_tiles(&self, envelope: Bytes) -> impl Future<Output = TileResult<Bytes>> + Send;
}

/// A kind of tile computed remotely.
///
/// Implementations translate request parameters into the service's tile
/// configuration and the service's raw payloads into client bytes.
pub trait RemoteTile: Send + Sync + 'static {
    fn tile_type(&self) -> &str;

    /// Builds the tile configuration sent in the envelope.
    fn build_config(&self, params: &Params) -> TileResult<Value>;

    /// Converts one raw payload.
    fn convert(&self, config: &Value, coord: &TileCoord, payload: &[u8]) -> TileResult<Bytes>;

    /// The tile returned when the response has no record for a coordinate.
    fn default_tile(&self, config: &Value) -> TileResult<Bytes>;
}

fn field_config(params: &Params, resolution: u32) -> TileResult<Value> {
    let mut config = json!({
        "type": "heatmap",
        "xField": params::require_str(params, "xField")?,
        "yField": params::require_str(params, "yField")?,
        "resolution": resolution,
    });
    if let Some(value_field) = params::optional_str(params, "valueField")? {
        config["valueField"] = Value::from(value_field);
    }
    Ok(config)
}

/// Total number of documents in a tile, as `{"count":N}`.
///
/// Computed remotely as a one-bin heatmap whose payload is a little-endian
/// u32.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountTile;

impl RemoteTile for CountTile {
    fn tile_type(&self) -> &str {
        "count"
    }

    fn build_config(&self, params: &Params) -> TileResult<Value> {
        field_config(params, 1)
    }

    fn convert(&self, _config: &Value, coord: &TileCoord, payload: &[u8]) -> TileResult<Bytes> {
        let raw: [u8; 4] = payload
            .get(..4)
            .and_then(|head| head.try_into().ok())
            .ok_or_else(|| {
                TileError::Decode(format!(
                    "count payload for {} has {} bytes, expected 4",
                    coord,
                    payload.len()
                ))
            })?;
        let count = u32::from_le_bytes(raw);
        Ok(Bytes::from(json!({ "count": count }).to_string()))
    }

    fn default_tile(&self, _config: &Value) -> TileResult<Bytes> {
        Ok(Bytes::from_static(br#"{"count":0}"#))
    }
}

/// Binned counts as `resolution²` little-endian f32 values.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatmapTile;

impl HeatmapTile {
    fn resolution(config: &Value) -> TileResult<usize> {
        config
            .get("resolution")
            .and_then(Value::as_u64)
            .map(|r| r as usize)
            .ok_or_else(|| TileError::config("heatmap tile configuration lacks `resolution`"))
    }
}

impl RemoteTile for HeatmapTile {
    fn tile_type(&self) -> &str {
        "heatmap"
    }

    fn build_config(&self, params: &Params) -> TileResult<Value> {
        let resolution = params::resolution_or(params, "resolution", crate::coord::MAX_TILE_RESOLUTION)?;
        field_config(params, resolution)
    }

    fn convert(&self, config: &Value, coord: &TileCoord, payload: &[u8]) -> TileResult<Bytes> {
        let resolution = Self::resolution(config)?;
        let expected = resolution * resolution * 4;
        if payload.len() != expected {
            return Err(TileError::Decode(format!(
                "heatmap payload for {} has {} bytes, expected {}",
                coord,
                payload.len(),
                expected
            )));
        }
        Ok(Bytes::copy_from_slice(payload))
    }

    fn default_tile(&self, config: &Value) -> TileResult<Bytes> {
        let resolution = Self::resolution(config)?;
        Ok(Bytes::from(vec![0u8; resolution * resolution * 4]))
    }
}
