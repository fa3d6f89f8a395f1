//! Typed access to JSON request parameters.
//!
//! Tile requests carry their generator-specific configuration as a JSON
//! object. These helpers pull typed values out of it and turn missing or
//! mistyped entries into [`TileError::Config`].

use crate::error::{TileError, TileResult};
use crate::lod::MAX_LOD;
use serde_json::{Map, Value};

/// Request parameters as received from the caller.
pub type Params = Map<String, Value>;

/// Required string parameter.
pub fn require_str<'a>(params: &'a Params, key: &str) -> TileResult<&'a str> {
    match params.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(_) => Err(TileError::config(format!("`{}` must be a non-empty string", key))),
        None => Err(TileError::config(format!("`{}` parameter missing from tile", key))),
    }
}

/// Optional string parameter; an empty string counts as absent.
pub fn optional_str<'a>(params: &'a Params, key: &str) -> TileResult<Option<&'a str>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(TileError::config(format!("`{}` must be a string", key))),
    }
}

/// Unsigned integer parameter with a default.
pub fn usize_or(params: &Params, key: &str, default: usize) -> TileResult<usize> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .or_else(|| {
                // accept whole floats such as 256.0 from loosely typed clients
                value
                    .as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .map(|n| n as usize)
            .ok_or_else(|| {
                TileError::config(format!("`{}` must be a non-negative integer", key))
            }),
    }
}

/// Required unsigned integer parameter.
pub fn require_usize(params: &Params, key: &str) -> TileResult<usize> {
    match params.get(key) {
        None | Some(Value::Null) => Err(TileError::config(format!(
            "`{}` parameter missing from tile",
            key
        ))),
        Some(_) => usize_or(params, key, 0),
    }
}

/// Optional array of strings; an empty array counts as absent.
pub fn optional_str_array(params: &Params, key: &str) -> TileResult<Option<Vec<String>>> {
    let invalid = || TileError::config(format!("`{}` must be an array of strings", key));
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) if items.is_empty() => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<TileResult<Vec<_>>>()
            .map(Some),
        Some(_) => Err(invalid()),
    }
}

/// Required nested object parameter.
pub fn require_object<'a>(params: &'a Params, key: &str) -> TileResult<&'a Params> {
    match params.get(key) {
        Some(Value::Object(child)) => Ok(child),
        Some(_) => Err(TileError::config(format!("`{}` must be an object", key))),
        None => Err(TileError::config(format!("`{}` parameter missing from tile", key))),
    }
}

/// Level-of-detail parameter: 0 (plain) up to [`MAX_LOD`] offset levels.
pub fn lod_or(params: &Params, key: &str, default: usize) -> TileResult<usize> {
    let lod = usize_or(params, key, default)?;
    if lod > MAX_LOD {
        return Err(TileError::config(format!(
            "`{}` must be between 0 and {}",
            key, MAX_LOD
        )));
    }
    Ok(lod)
}

/// Bin resolution parameter: a power of two no larger than the tile resolution.
pub fn resolution_or(params: &Params, key: &str, default: u32) -> TileResult<u32> {
    let resolution = usize_or(params, key, default as usize)?;
    let max = crate::coord::MAX_TILE_RESOLUTION as usize;
    if resolution == 0 || resolution > max || !resolution.is_power_of_two() {
        return Err(TileError::config(format!(
            "`{}` must be a power of two between 1 and {}",
            key, max
        )));
    }
    Ok(resolution as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("test params must be an object"),
        }
    }

    #[test]
    fn test_require_str() {
        let p = params(json!({ "xField": "pickup.x", "empty": "", "num": 3 }));
        assert_eq!(require_str(&p, "xField").unwrap(), "pickup.x");
        assert!(matches!(require_str(&p, "empty"), Err(TileError::Config(_))));
        assert!(matches!(require_str(&p, "num"), Err(TileError::Config(_))));
        assert_eq!(
            require_str(&p, "yField"),
            Err(TileError::config("`yField` parameter missing from tile"))
        );
    }

    #[test]
    fn test_optional_str() {
        let p = params(json!({ "valueField": "fare", "blank": "" }));
        assert_eq!(optional_str(&p, "valueField").unwrap(), Some("fare"));
        assert_eq!(optional_str(&p, "blank").unwrap(), None);
        assert_eq!(optional_str(&p, "missing").unwrap(), None);
    }

    #[test]
    fn test_usize_or() {
        let p = params(json!({ "lod": 4, "float": 8.0, "neg": -1, "text": "4" }));
        assert_eq!(usize_or(&p, "lod", 0).unwrap(), 4);
        assert_eq!(usize_or(&p, "float", 0).unwrap(), 8);
        assert_eq!(usize_or(&p, "missing", 2).unwrap(), 2);
        assert!(usize_or(&p, "neg", 0).is_err());
        assert!(usize_or(&p, "text", 0).is_err());
    }

    #[test]
    fn test_lod_is_bounded() {
        let p = params(json!({ "lod": 8, "max": MAX_LOD, "huge": 17_179_869_184u64, "over": MAX_LOD + 1 }));
        assert_eq!(lod_or(&p, "lod", 0).unwrap(), 8);
        assert_eq!(lod_or(&p, "max", 0).unwrap(), MAX_LOD);
        assert_eq!(lod_or(&p, "missing", 3).unwrap(), 3);
        assert!(matches!(lod_or(&p, "huge", 0), Err(TileError::Config(_))));
        assert!(matches!(lod_or(&p, "over", 0), Err(TileError::Config(_))));
    }

    #[test]
    fn test_required_and_nested_params() {
        let p = params(json!({
            "hitsCount": 5,
            "includeFields": ["name", "fare"],
            "none": [],
            "mixed": ["name", 1],
            "top_terms": { "field": "tags" }
        }));
        assert_eq!(require_usize(&p, "hitsCount").unwrap(), 5);
        assert!(matches!(require_usize(&p, "missing"), Err(TileError::Config(_))));
        assert_eq!(
            optional_str_array(&p, "includeFields").unwrap(),
            Some(vec!["name".to_string(), "fare".to_string()])
        );
        assert_eq!(optional_str_array(&p, "none").unwrap(), None);
        assert!(optional_str_array(&p, "mixed").is_err());
        assert_eq!(require_str(require_object(&p, "top_terms").unwrap(), "field").unwrap(), "tags");
        assert!(require_object(&p, "hitsCount").is_err());
    }

    #[test]
    fn test_resolution_must_be_power_of_two() {
        let p = params(json!({ "ok": 64, "odd": 100, "big": 512 }));
        assert_eq!(resolution_or(&p, "ok", 256).unwrap(), 64);
        assert_eq!(resolution_or(&p, "missing", 256).unwrap(), 256);
        assert!(resolution_or(&p, "odd", 256).is_err());
        assert!(resolution_or(&p, "big", 256).is_err());
    }
}
