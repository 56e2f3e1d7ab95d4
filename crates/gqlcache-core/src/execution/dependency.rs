//! # Dependency Tracker
//!
//! Accumulator collecting the cache keys a result was built from. A change
//! to any of them (reported by a merge) means the result may be outdated.

use super::accumulator::ResultAccumulator;
use super::{FieldExecutionInfo, ObjectExecutionInfo};
use crate::types::{CacheError, CacheKey, FieldValue, Timestamp};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct DependencyTracker {
    dependent_keys: BTreeSet<CacheKey>,
}

impl DependencyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, info: &FieldExecutionInfo<'_>) {
        self.dependent_keys.insert(info.cache_path.joined());
    }
}

impl ResultAccumulator for DependencyTracker {
    type PartialResult = ();
    type FieldEntry = ();
    type ObjectResult = ();
    type FinalResult = BTreeSet<CacheKey>;

    fn requires_cache_key_computation(&self) -> bool {
        true
    }

    fn accept_scalar(
        &mut self,
        _value: &FieldValue,
        _received_at: Timestamp,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<(), CacheError> {
        self.record(info);
        Ok(())
    }

    fn accept_custom_scalar(
        &mut self,
        _value: &FieldValue,
        _received_at: Timestamp,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<(), CacheError> {
        self.record(info);
        Ok(())
    }

    fn accept_null(&mut self, _received_at: Timestamp, info: &FieldExecutionInfo<'_>) -> Result<(), CacheError> {
        self.record(info);
        Ok(())
    }

    fn accept_missing(&mut self, _received_at: Timestamp, info: &FieldExecutionInfo<'_>) -> Result<(), CacheError> {
        self.record(info);
        Ok(())
    }

    fn accept_list(&mut self, _list: Vec<()>, info: &FieldExecutionInfo<'_>) -> Result<(), CacheError> {
        self.record(info);
        Ok(())
    }

    fn accept_child_object(
        &mut self,
        _object: (),
        _received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    fn accept_field_entry(&mut self, _entry: (), info: &FieldExecutionInfo<'_>) -> Result<Option<()>, CacheError> {
        self.record(info);
        Ok(Some(()))
    }

    fn accept_field_entries(&mut self, _entries: Vec<()>, _info: &ObjectExecutionInfo) -> Result<(), CacheError> {
        Ok(())
    }

    fn finish(&mut self, _root: (), _info: &ObjectExecutionInfo) -> Result<BTreeSet<CacheKey>, CacheError> {
        Ok(std::mem::take(&mut self.dependent_keys))
    }
}
