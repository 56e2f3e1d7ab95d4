//! # Result Normalizer
//!
//! Accumulator flattening a result tree into a `RecordSet`. Every object
//! becomes a record keyed by its cache path (its identity key when it has
//! one); the field that held it stores a `CacheReference` instead.

use super::accumulator::ResultAccumulator;
use super::{FieldExecutionInfo, ObjectExecutionInfo};
use crate::record_set::RecordSet;
use crate::types::{CacheError, CacheKey, CacheReference, FieldValue, Timestamp};

/// Flattens a result into records received at `received_at`.
#[derive(Debug, Clone)]
pub struct ResultNormalizer {
    received_at: Timestamp,
    records: RecordSet,
}

impl ResultNormalizer {
    #[must_use]
    pub fn new(received_at: Timestamp) -> Self {
        Self {
            received_at,
            records: RecordSet::new(),
        }
    }
}

impl ResultAccumulator for ResultNormalizer {
    /// `None` for a missing value: the field is not written.
    type PartialResult = Option<FieldValue>;
    type FieldEntry = (CacheKey, FieldValue);
    type ObjectResult = CacheReference;
    type FinalResult = RecordSet;

    fn requires_cache_key_computation(&self) -> bool {
        true
    }

    fn accept_scalar(
        &mut self,
        value: &FieldValue,
        _received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(Some(value.clone()))
    }

    fn accept_custom_scalar(
        &mut self,
        value: &FieldValue,
        _received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(Some(value.clone()))
    }

    fn accept_null(
        &mut self,
        _received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(Some(FieldValue::Null))
    }

    fn accept_missing(
        &mut self,
        _received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(None)
    }

    fn accept_list(
        &mut self,
        list: Vec<Self::PartialResult>,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(Some(FieldValue::List(
            list.into_iter()
                .map(|item| item.unwrap_or(FieldValue::Null))
                .collect(),
        )))
    }

    fn accept_child_object(
        &mut self,
        object: Self::ObjectResult,
        _received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(Some(FieldValue::Reference(object)))
    }

    fn accept_field_entry(
        &mut self,
        entry: Self::PartialResult,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<Self::FieldEntry>, CacheError> {
        Ok(entry.map(|value| (info.cache_key_for_field.clone(), value)))
    }

    fn accept_field_entries(
        &mut self,
        entries: Vec<Self::FieldEntry>,
        info: &ObjectExecutionInfo,
    ) -> Result<Self::ObjectResult, CacheError> {
        let key = info.cache_path.joined();
        self.records
            .fields_mut(&key, self.received_at)
            .extend(entries);
        Ok(CacheReference::new(key))
    }

    fn finish(
        &mut self,
        _root: Self::ObjectResult,
        _info: &ObjectExecutionInfo,
    ) -> Result<Self::FinalResult, CacheError> {
        Ok(std::mem::take(&mut self.records))
    }
}
