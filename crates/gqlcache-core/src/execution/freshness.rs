//! # First-Received-At Tracker
//!
//! Accumulator computing the age of a result: the OLDEST timestamp among
//! the fields it visited. Null and missing values contribute nothing; an
//! object field contributes the time the field holding it was received, so
//! a stale parent record ages the whole subtree.

use super::accumulator::ResultAccumulator;
use super::{FieldExecutionInfo, ObjectExecutionInfo};
use crate::types::{CacheError, FieldValue, Timestamp};

/// Freshness metadata of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultMetadata {
    /// Oldest contributing timestamp; `Timestamp::DISTANT_PAST` when
    /// nothing contributed.
    pub max_age: Timestamp,
}

impl Default for ResultMetadata {
    fn default() -> Self {
        Self {
            max_age: Timestamp::DISTANT_PAST,
        }
    }
}

fn oldest(timestamps: impl IntoIterator<Item = Option<Timestamp>>) -> Option<Timestamp> {
    timestamps.into_iter().flatten().min()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FirstReceivedAtTracker;

impl FirstReceivedAtTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ResultAccumulator for FirstReceivedAtTracker {
    type PartialResult = Option<Timestamp>;
    type FieldEntry = Option<Timestamp>;
    type ObjectResult = Option<Timestamp>;
    type FinalResult = ResultMetadata;

    fn accept_scalar(
        &mut self,
        _value: &FieldValue,
        received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(Some(received_at))
    }

    fn accept_custom_scalar(
        &mut self,
        _value: &FieldValue,
        received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(Some(received_at))
    }

    fn accept_null(
        &mut self,
        _received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(None)
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
        Ok(oldest(list))
    }

    fn accept_child_object(
        &mut self,
        object: Self::ObjectResult,
        received_at: Timestamp,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError> {
        Ok(oldest([object, Some(received_at)]))
    }

    fn accept_field_entry(
        &mut self,
        entry: Self::PartialResult,
        _info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<Self::FieldEntry>, CacheError> {
        Ok(Some(entry))
    }

    fn accept_field_entries(
        &mut self,
        entries: Vec<Self::FieldEntry>,
        _info: &ObjectExecutionInfo,
    ) -> Result<Self::ObjectResult, CacheError> {
        Ok(oldest(entries))
    }

    fn finish(
        &mut self,
        root: Self::ObjectResult,
        _info: &ObjectExecutionInfo,
    ) -> Result<Self::FinalResult, CacheError> {
        Ok(ResultMetadata {
            max_age: root.unwrap_or(Timestamp::DISTANT_PAST),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_ignores_non_contributors() {
        assert_eq!(oldest([None, Some(Timestamp(5)), Some(Timestamp(3))]), Some(Timestamp(3)));
        assert_eq!(oldest(Vec::new()), None);
        assert_eq!(oldest([None, None]), None);
    }

    #[test]
    fn empty_result_reports_distant_past() {
        let mut tracker = FirstReceivedAtTracker::new();
        let metadata = tracker
            .finish(None, &ObjectExecutionInfo::root("QUERY_ROOT"))
            .expect("finish");
        assert_eq!(metadata.max_age, Timestamp::DISTANT_PAST);
    }
}
