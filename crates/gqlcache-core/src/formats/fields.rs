//! # Field Format
//!
//! JSON encoding of a record's fields, as stored by persistent backends.
//!
//! - Scalars map to JSON scalars; integers and floats stay distinct
//!   (floats always carry a decimal point or exponent)
//! - `CacheReference` encodes as `{"$reference": "<key>"}`
//! - Stored objects encode as `{"$object": {...}}`
//!
//! A string that happens to look like a key stays a string: references
//! are only ever recognized by their marker object.

use crate::primitives::{OBJECT_MARKER, REFERENCE_MARKER};
use crate::types::{CacheError, CacheReference, FieldValue, Fields};
use serde_json::{Map, Value};

fn encode(value: &FieldValue) -> Result<Value, String> {
    Ok(match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| format!("non-finite float {f}"))?,
        FieldValue::String(s) => Value::String(s.clone()),
        FieldValue::Reference(reference) => {
            let mut marker = Map::new();
            marker.insert(REFERENCE_MARKER.to_string(), Value::String(reference.key.clone()));
            Value::Object(marker)
        }
        FieldValue::List(items) => {
            Value::Array(items.iter().map(encode).collect::<Result<Vec<_>, _>>()?)
        }
        FieldValue::Object(map) => {
            let mut inner = Map::new();
            for (name, value) in map {
                inner.insert(name.clone(), encode(value)?);
            }
            let mut wrapper = Map::new();
            wrapper.insert(OBJECT_MARKER.to_string(), Value::Object(inner));
            Value::Object(wrapper)
        }
    })
}

fn decode(value: &Value) -> Result<FieldValue, String> {
    Ok(match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) if !n.is_f64() => FieldValue::Int(i),
            (_, Some(f)) => FieldValue::Float(f),
            _ => return Err(format!("unrepresentable number {n}")),
        },
        Value::String(s) => FieldValue::String(s.clone()),
        Value::Array(items) => {
            FieldValue::List(items.iter().map(decode).collect::<Result<Vec<_>, _>>()?)
        }
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(key)) = map.get(REFERENCE_MARKER) {
                    return Ok(FieldValue::Reference(CacheReference::new(key.clone())));
                }
                if let Some(Value::Object(inner)) = map.get(OBJECT_MARKER) {
                    return decode_map(inner).map(FieldValue::Object);
                }
            }
            return Err("object without a recognized marker".to_string());
        }
    })
}

fn decode_map(map: &Map<String, Value>) -> Result<Fields, String> {
    map.iter()
        .map(|(name, value)| decode(value).map(|value| (name.clone(), value)))
        .collect()
}

/// Serialize a record's fields to a UTF-8 JSON string.
pub fn serialize_fields(key: &str, fields: &Fields) -> Result<String, CacheError> {
    let mut object = Map::new();
    for (name, value) in fields {
        let encoded = encode(value).map_err(|reason| CacheError::Serialization(format!("{key}.{name}: {reason}")))?;
        object.insert(name.clone(), encoded);
    }
    serde_json::to_string(&Value::Object(object))
        .map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Deserialize the fields of the record at `key`.
pub fn deserialize_fields(key: &str, payload: &str) -> Result<Fields, CacheError> {
    let invalid = |reason: String| CacheError::InvalidRecordEncoding {
        key: key.to_string(),
        reason,
    };

    let value: Value = serde_json::from_str(payload).map_err(|e| invalid(e.to_string()))?;
    match value {
        Value::Object(map) => decode_map(&map).map_err(invalid),
        other => Err(invalid(format!("expected a JSON object, found {other}"))),
    }
}

// =============================================================================
// TESTS
// =============================================================================
