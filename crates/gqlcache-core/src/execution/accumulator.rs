//! # Result Accumulators
//!
//! The visitor protocol of the execution walk, and its tuple composition.

use super::{FieldExecutionInfo, ObjectExecutionInfo};
use crate::types::{CacheError, FieldValue, Timestamp};

/// Builds one derived result from the events of an execution walk.
///
/// `PartialResult` is a completed field value, `FieldEntry` what a field
/// contributes to its object, `ObjectResult` a completed object and
/// `FinalResult` what the walk returns.
pub trait ResultAccumulator {
    type PartialResult;
    type FieldEntry;
    type ObjectResult;
    type FinalResult;

    /// Whether objects need their identity key computed during the walk.
    fn requires_cache_key_computation(&self) -> bool {
        false
    }

    fn accept_scalar(
        &mut self,
        value: &FieldValue,
        received_at: Timestamp,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError>;

    fn accept_custom_scalar(
        &mut self,
        value: &FieldValue,
        received_at: Timestamp,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError>;

    fn accept_null(
        &mut self,
        received_at: Timestamp,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError>;

    fn accept_missing(
        &mut self,
        received_at: Timestamp,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError>;

    fn accept_list(
        &mut self,
        list: Vec<Self::PartialResult>,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError>;

    /// `received_at` is the time the field holding the object was received.
    fn accept_child_object(
        &mut self,
        object: Self::ObjectResult,
        received_at: Timestamp,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Self::PartialResult, CacheError>;

    /// `None` leaves the field out of its object.
    fn accept_field_entry(
        &mut self,
        entry: Self::PartialResult,
        info: &FieldExecutionInfo<'_>,
    ) -> Result<Option<Self::FieldEntry>, CacheError>;

    fn accept_field_entries(
        &mut self,
        entries: Vec<Self::FieldEntry>,
        info: &ObjectExecutionInfo,
    ) -> Result<Self::ObjectResult, CacheError>;

    fn finish(
        &mut self,
        root: Self::ObjectResult,
        info: &ObjectExecutionInfo,
    ) -> Result<Self::FinalResult, CacheError>;
}

// =============================================================================
// ZIP
// =============================================================================

/// Implements `ResultAccumulator` for a tuple, fanning every event out to
/// each member and tupling the results. A member that drops a field entry
/// only drops it for itself.
macro_rules! zip_accumulators {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: ResultAccumulator),+> ResultAccumulator for ($($name,)+) {
            type PartialResult = ($($name::PartialResult,)+);
            type FieldEntry = ($(Option<$name::FieldEntry>,)+);
            type ObjectResult = ($($name::ObjectResult,)+);
            type FinalResult = ($($name::FinalResult,)+);

            fn requires_cache_key_computation(&self) -> bool {
                false $(|| self.$idx.requires_cache_key_computation())+
            }

            fn accept_scalar(
                &mut self,
                value: &FieldValue,
                received_at: Timestamp,
                info: &FieldExecutionInfo<'_>,
            ) -> Result<Self::PartialResult, CacheError> {
                Ok(($(self.$idx.accept_scalar(value, received_at, info)?,)+))
            }

            fn accept_custom_scalar(
                &mut self,
                value: &FieldValue,
                received_at: Timestamp,
                info: &FieldExecutionInfo<'_>,
            ) -> Result<Self::PartialResult, CacheError> {
                Ok(($(self.$idx.accept_custom_scalar(value, received_at, info)?,)+))
            }

            fn accept_null(
                &mut self,
                received_at: Timestamp,
                info: &FieldExecutionInfo<'_>,
            ) -> Result<Self::PartialResult, CacheError> {
                Ok(($(self.$idx.accept_null(received_at, info)?,)+))
            }

            fn accept_missing(
                &mut self,
                received_at: Timestamp,
                info: &FieldExecutionInfo<'_>,
            ) -> Result<Self::PartialResult, CacheError> {
                Ok(($(self.$idx.accept_missing(received_at, info)?,)+))
            }

            fn accept_list(
                &mut self,
                list: Vec<Self::PartialResult>,
                info: &FieldExecutionInfo<'_>,
            ) -> Result<Self::PartialResult, CacheError> {
                let mut columns = ($(Vec::<$name::PartialResult>::with_capacity(list.len()),)+);
                for item in list {
                    $(columns.$idx.push(item.$idx);)+
                }
                Ok(($(self.$idx.accept_list(columns.$idx, info)?,)+))
            }

            fn accept_child_object(
                &mut self,
                object: Self::ObjectResult,
                received_at: Timestamp,
                info: &FieldExecutionInfo<'_>,
            ) -> Result<Self::PartialResult, CacheError> {
                Ok(($(self.$idx.accept_child_object(object.$idx, received_at, info)?,)+))
            }

            fn accept_field_entry(
                &mut self,
                entry: Self::PartialResult,
                info: &FieldExecutionInfo<'_>,
            ) -> Result<Option<Self::FieldEntry>, CacheError> {
                Ok(Some(($(self.$idx.accept_field_entry(entry.$idx, info)?,)+)))
            }

            fn accept_field_entries(
                &mut self,
                entries: Vec<Self::FieldEntry>,
                info: &ObjectExecutionInfo,
            ) -> Result<Self::ObjectResult, CacheError> {
                let mut columns = ($(Vec::<$name::FieldEntry>::with_capacity(entries.len()),)+);
                for entry in entries {
                    $(if let Some(member) = entry.$idx {
                        columns.$idx.push(member);
                    })+
                }
                Ok(($(self.$idx.accept_field_entries(columns.$idx, info)?,)+))
            }

            fn finish(
                &mut self,
                root: Self::ObjectResult,
                info: &ObjectExecutionInfo,
            ) -> Result<Self::FinalResult, CacheError> {
                Ok(($(self.$idx.finish(root.$idx, info)?,)+))
            }
        }
    };
}

zip_accumulators!(A: 0, B: 1);
zip_accumulators!(A: 0, B: 1, C: 2);
zip_accumulators!(A: 0, B: 1, C: 2, D: 3);
