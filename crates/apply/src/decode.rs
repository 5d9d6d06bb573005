//! Manifest decoding into [`GenericObject`].

use relay_core::{GenericObject, Gvk, OpError};
use serde_json::Value as Json;

fn max_manifest_bytes() -> usize {
    std::env::var("RELAY_MAX_MANIFEST_BYTES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1_048_576) // 1 MiB default
}

fn max_manifest_nodes() -> usize {
    std::env::var("RELAY_MAX_MANIFEST_NODES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(100_000)
}

/// True when `v` has more than `max` nodes. Stops counting at `max + 1`.
fn node_budget_exceeded(v: &Json, max: usize) -> bool {
    fn walk(v: &Json, cur: &mut usize, max: usize) {
        if *cur >= max { return; }
        *cur += 1;
        match v {
            Json::Object(map) => {
                for vv in map.values() {
                    if *cur >= max { break; }
                    walk(vv, cur, max);
                }
            }
            Json::Array(arr) => {
                for vv in arr {
                    if *cur >= max { break; }
                    walk(vv, cur, max);
                }
            }
            _ => {}
        }
    }
    let mut count = 0usize;
    walk(v, &mut count, max.saturating_add(1));
    count > max
}

fn check_size(len: usize) -> Result<(), OpError> {
    let max = max_manifest_bytes();
    if len > max {
        return Err(OpError::Decode(format!("manifest too large (>{} bytes)", max)));
    }
    Ok(())
}

/// Decode a JSON manifest. Returns the object and its group/version/kind.
pub fn decode_manifest(input: &str) -> Result<(GenericObject, Gvk), OpError> {
    check_size(input.len())?;
    let json: Json = serde_json::from_str(input).map_err(|e| OpError::Decode(format!("parsing JSON: {}", e)))?;
    from_json(json)
}

/// Decode a YAML manifest (single document).
pub fn decode_manifest_yaml(input: &str) -> Result<(GenericObject, Gvk), OpError> {
    check_size(input.len())?;
    let val: serde_yaml::Value =
        serde_yaml::from_str(input).map_err(|e| OpError::Decode(format!("parsing YAML: {}", e)))?;
    let json = serde_json::to_value(val).map_err(|e| OpError::Decode(format!("converting YAML to JSON: {}", e)))?;
    from_json(json)
}

fn from_json(json: Json) -> Result<(GenericObject, Gvk), OpError> {
    let max = max_manifest_nodes();
    if node_budget_exceeded(&json, max) {
        return Err(OpError::Decode(format!("manifest too complex (>{} nodes)", max)));
    }
    let obj = GenericObject::from_value(json)
        .ok_or_else(|| OpError::Decode("manifest top level must be an object".into()))?;
    let api_version = obj.api_version().ok_or_else(|| OpError::Decode("manifest missing apiVersion".into()))?;
    let kind = obj.kind().ok_or_else(|| OpError::Decode("manifest missing kind".into()))?;
    let gvk = Gvk::from_api_version(api_version, kind)
        .ok_or_else(|| OpError::Decode(format!("malformed apiVersion {:?} / kind {:?}", api_version, kind)))?;
    Ok((obj, gvk))
}
