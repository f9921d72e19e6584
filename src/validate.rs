use serde_json::Value;

use crate::error::FetchError;
use crate::types::raw::RawAssetResponse;

const REQUIRED_KEYS: [&str; 6] = ["asset", "score", "scale", "pillars", "as_of", "version"];

/// Check the shape of a decoded payload and deserialize it.
///
/// Checks run in order, failing fast on the first violation: the payload
/// is a JSON object, every required key is present, `pillars` is an
/// array, and `scale` is an array of exactly two numbers. Nothing deeper
/// is checked here; scale monotonicity and pillar element shape are
/// tolerated downstream, with missing pillar fields treated as absent.
pub fn validate_response(payload: &Value) -> Result<RawAssetResponse, FetchError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| FetchError::Validation("payload is not an object".to_string()))?;

    for key in REQUIRED_KEYS {
        if !obj.contains_key(key) {
            return Err(FetchError::Validation(format!("missing key `{}`", key)));
        }
    }

    if !obj["pillars"].is_array() {
        return Err(FetchError::Validation("`pillars` is not an array".to_string()));
    }

    let scale_ok = obj["scale"]
        .as_array()
        .map_or(false, |pair| pair.len() == 2 && pair.iter().all(Value::is_number));
    if !scale_ok {
        return Err(FetchError::Validation(
            "`scale` is not a pair of numbers".to_string(),
        ));
    }

    serde_json::from_value(payload.clone()).map_err(|e| FetchError::Validation(e.to_string()))
}
