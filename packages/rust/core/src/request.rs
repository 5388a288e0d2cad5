//! Request-body decoding shared by every endpoint.
//!
//! Clients send either a JSON object or a JSON string that itself encodes an
//! object; an empty body reads as `{}`.

use serde_json::{Map, Value};

use lineuprelay_shared::{RelayError, Result, value_to_string};

/// Decode a request body into a JSON object.
pub fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| RelayError::validation("Invalid request body: not UTF-8"))?;

    if text.trim().is_empty() {
        return Ok(Map::new());
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| RelayError::validation_with("Invalid JSON body", e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(inner) if inner.trim().is_empty() => Ok(Map::new()),
        Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(RelayError::validation("Invalid JSON body")),
        },
        _ => Err(RelayError::validation("Invalid request body")),
    }
}

/// First non-blank scalar among `keys`, trimmed.
pub fn str_field(body: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| body.get(*k).and_then(value_to_string))
}

/// Like [`str_field`], but missing values are a validation error.
pub fn require_str(body: &Map<String, Value>, key: &str) -> Result<String> {
    str_field(body, &[key]).ok_or_else(|| RelayError::validation(format!("Missing {key}")))
}
