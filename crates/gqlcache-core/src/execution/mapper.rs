//! # Selection Set Mapper
//!
//! Accumulator producing the response data as JSON, ready to be decoded
//! into typed structures. Scalars are converted to the field's declared
//! type; anything that does not convert is a `TypeMismatch`.

use super::accumulator::ResultAccumulator;
use super::selection::{OutputType, ScalarType};
use super::{FieldExecutionInfo, ObjectExecutionInfo};
use crate::types::{CacheError, FieldValue, Timestamp};
use serde_json::{Map, Value};

/// What to do when a selected field is absent from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleMissingValues {
    /// Fail with `MissingFieldValue`.
    #[default]
    Disallow,
    /// Leave out nullable fields; fail on non-null ones.
    AllowForOptionalFields,
    /// Leave out any missing field. Only for test and mock data.
    AllowForAllFields,
}

/// Builds the response data object.
#[derive(Debug, Clone, Default)]
pub struct SelectionSetMapper {
    handle_missing_values: HandleMissingValues,
}

impl SelectionSetMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_missing_values(handle_missing_values: HandleMissingValues) -> Self {
        Self {
            handle_missing_values,
        }
    }
}

fn mismatch(expected: &str, value: &FieldValue) -> CacheError {
    CacheError::TypeMismatch {
        expected: expected.to_string(),
        found: value.kind().to_string(),
    }
}

/// Convert a stored or received scalar to `scalar`.
///
/// `ID` accepts integers (rendered as strings) and `Float` accepts
/// integers; every other type only accepts its own kind.
fn convert_scalar(scalar: ScalarType, value: &FieldValue) -> Result<Value, CacheError> {
    match (scalar, value) {
        (ScalarType::String | ScalarType::Id, FieldValue::String(s)) => Ok(Value::String(s.clone())),
        (ScalarType::Id, FieldValue::Int(i)) => Ok(Value::String(i.to_string())),
        (ScalarType::Int, FieldValue::Int(i)) => Ok(Value::from(*i)),
        (ScalarType::Float, FieldValue::Int(i)) => Ok(Value::from(*i as f64)),
        (ScalarType::Float, FieldValue::Float(f)) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| mismatch(scalar.name(), value)),
        (ScalarType::Boolean, FieldValue::Bool(b)) => Ok(Value::Bool(*b)),
        _ => Err(mismatch(scalar.name(), value)),
    }
}

impl ResultAccumulator for SelectionSetMapper {
    type PartialResult = Option<Value>;
    type FieldEntry = (String, Value);
    type ObjectResult = Map<String, Value>;
    type FinalResult = Map<String, Value>;

    fn accept_scalar(
        &mut self,
        value: &FieldValue,
        _received_at: Timestamp,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        match info.field.output.named_type() {
            OutputType::Scalar(scalar) => convert_scalar(*scalar, value).map(Some),
            other => Err(mismatch(&other.describe(), value)),
        }
    }

    fn accept_custom_scalar(
        &mut self,
        value: &FieldValue,
        _received_at: Timestamp,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        value
            .to_plain_json()
            .map(Some)
            .ok_or_else(|| mismatch(&info.field.output.named_type().describe(), value))
    }

    fn accept_null(
        &mut self,
        _received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(Some(Value::Null))
    }

    fn accept_missing(
        &mut self,
        _received_at: Timestamp,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        match self.handle_missing_values {
            HandleMissingValues::AllowForOptionalFields if info.field.output.is_nullable() => {
                Ok(None)
            }
            HandleMissingValues::AllowForAllFields => Ok(None),
            _ => Err(CacheError::MissingFieldValue),
        }
    }

    fn accept_list(
        &mut self,
        list: Vec<Self::PartialResult>,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(Some(Value::Array(
            list.into_iter()
                .map(|item| item.unwrap_or(Value::Null))
                .collect(),
        )))
    }

    fn accept_child_object(
        &mut self,
        object: Self::ObjectResult,
        _received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(Some(Value::Object(object)))
    }

    fn accept_field_entry(
        &mut self,
        entry: Self::PartialResult,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<Self::FieldEntry>, CacheError> {
        Ok(entry.map(|value| (info.response_key.clone(), value)))
    }

    fn accept_field_entries(
        &mut self,
        entries: Vec<Self::FieldEntry>,
        _info: &ObjectExecutionInfo,
    ) -> Result<Self::ObjectResult, CacheError> {
        Ok(entries.into_iter().collect())
    }

    fn finish(
        &mut self,
        root: Self::ObjectResult,
        _info: &ObjectExecutionInfo,
    ) -> Result<Self::FinalResult, CacheError> {
        Ok(root)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_accepts_integers_as_strings() {
        assert_eq!(
            convert_scalar(ScalarType::Id, &FieldValue::Int(2001)),
            Ok(Value::String("2001".to_string()))
        );
    }

    #[test]
    fn float_accepts_integers() {
        assert_eq!(
            convert_scalar(ScalarType::Float, &FieldValue::Int(3)),
            Ok(Value::from(3.0))
        );
    }

    #[test]
    fn string_rejects_objects() {
        let err = convert_scalar(ScalarType::String, &FieldValue::Object(Default::default()))
            .expect_err("objects are not strings");
        assert_eq!(
            err,
            CacheError::TypeMismatch {
                expected: "String".to_string(),
                found: "object".to_string(),
            }
        );
    }

    #[test]
    fn int_rejects_floats() {
        assert!(convert_scalar(ScalarType::Int, &FieldValue::Float(1.5)).is_err());
        assert!(convert_scalar(ScalarType::Boolean, &FieldValue::from("true")).is_err());
    }
}
