//! The remote version descriptor: `{ "version": "<opaque string>" }`.

use serde_json::Value;

use staleguard_types::BuildVersion;

use crate::CheckError;

/// Parse a descriptor body. Fields other than `version` are ignored.
pub fn parse_descriptor(bytes: &[u8]) -> Result<BuildVersion, CheckError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| CheckError::Malformed(e.to_string()))?;

    let Value::Object(map) = value else {
        return Err(CheckError::Malformed("descriptor is not an object".to_string()));
    };

    match map.get("version") {
        Some(Value::String(version)) => Ok(BuildVersion::remote(version.as_str())),
        Some(other) => Err(CheckError::Malformed(format!(
            "`version` must be a string, got {}",
            json_type(other)
        ))),
        None => Err(CheckError::Malformed("missing `version` field".to_string())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
