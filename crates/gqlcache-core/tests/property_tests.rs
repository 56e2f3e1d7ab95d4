//! # Property-Based Tests
//!
//! Merge and key-algebra invariants checked with proptest.

use gqlcache_core::{
    CacheReference, FieldValue, Fields, Freshness, Record, RecordSet, Timestamp,
    matches_key_pattern, record_key_of, split_components,
};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;

// =============================================================================
// STRATEGIES
// =============================================================================

fn field_value() -> impl Strategy<Value = FieldValue> {
    let leaf = prop_oneof![
        Just(FieldValue::Null),
        any::<bool>().prop_map(FieldValue::Bool),
        any::<i64>().prop_map(FieldValue::Int),
        "[a-z]{0,8}".prop_map(FieldValue::String),
        "[A-Za-z0-9:]{1,8}".prop_map(|key| FieldValue::Reference(CacheReference::new(key))),
    ];
    leaf.prop_recursive(2, 8, 4, |inner| vec(inner, 0..4).prop_map(FieldValue::List))
}

fn record(key: impl Strategy<Value = String>) -> impl Strategy<Value = Record> {
    (key, btree_map("[a-z]{1,6}", field_value(), 1..6))
        .prop_map(|(key, fields): (String, Fields)| Record::new(key, fields))
}

fn record_set() -> impl Strategy<Value = RecordSet> {
    vec(record("[A-Za-z0-9]{1,6}"), 0..8)
        .prop_map(|records| RecordSet::from_records(records, Timestamp(0)))
}

/// A field segment, optionally with an argument list containing dots.
fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}",
        ("[a-z]{1,6}", "[a-z]{1,4}", "[a-z.]{0,6}")
            .prop_map(|(name, arg, value)| format!("{name}({arg}:{value})")),
    ]
}

// =============================================================================
// MERGE
// =============================================================================

proptest! {
    /// Merging the same records twice changes nothing the second time.
    #[test]
    fn merge_is_idempotent(base in record_set(), incoming in record_set()) {
        let mut store = base;
        store.merge_at(incoming.clone(), Timestamp(10));
        let once = store.clone();

        let changed = store.merge_at(incoming, Timestamp(20));
        prop_assert!(changed.is_empty());
        prop_assert_eq!(store, once);
    }

    /// Changing one field of one record reports exactly that field.
    #[test]
    fn single_field_change_is_minimal(
        base in record_set(),
        new_value in "[A-Z]{1,8}",
    ) {
        prop_assume!(!base.is_empty());
        let target = base.iter().next().map(|row| row.record.clone());
        let Some(target) = target else {
            return Ok(());
        };
        let field = target.fields.keys().next().cloned().unwrap_or_default();

        let mut store = base;
        let update = Record::new(target.key.clone(), target.fields.clone())
            .with_field(field.clone(), FieldValue::String(new_value));
        let changed = store.merge_at(RecordSet::from_records([update], Timestamp(5)), Timestamp(5));

        prop_assert_eq!(changed.len(), 1);
        let expected_key = format!("{}.{}", target.key, field);
        prop_assert!(changed.contains(&expected_key));
    }

    /// Every changed key of a merge belongs to a record of the incoming set.
    #[test]
    fn changed_keys_map_to_incoming_records(base in record_set(), incoming in record_set()) {
        let incoming_keys = incoming.keys();
        let mut store = base;
        for key in store.merge_at(incoming, Timestamp(1)) {
            prop_assert!(incoming_keys.contains(&record_key_of(&key)), "{}", key);
        }
    }
}

// =============================================================================
// KEY ALGEBRA
// =============================================================================

proptest! {
    /// Dropping the leaf of `a.b(args).c` yields `a.b(args)`.
    #[test]
    fn record_key_drops_only_the_leaf(
        first in "[a-z]{1,6}",
        middle in segment(),
        leaf in "[a-z]{1,6}",
    ) {
        let owner = format!("{first}.{middle}");
        prop_assert_eq!(record_key_of(&format!("{owner}.{leaf}")), owner);
    }

    /// Argument lists survive splitting whole, whatever dots they contain.
    #[test]
    fn split_keeps_argument_lists_whole(segments in vec(segment(), 1..5)) {
        let key = segments.join(".");
        prop_assert_eq!(split_components(&key), segments);
    }

    /// Index segments stay attached to their field under a root key.
    #[test]
    fn root_indices_collapse(field in segment(), index in 0usize..100, leaf in "[a-z]{1,6}") {
        let key = format!("QUERY_ROOT.{field}.{index}.{leaf}");
        prop_assert_eq!(record_key_of(&key), format!("QUERY_ROOT.{field}.{index}"));
    }

    /// Single-segment keys own themselves.
    #[test]
    fn single_segment_maps_to_itself(key in "[A-Za-z0-9:]{1,10}") {
        prop_assert_eq!(record_key_of(&key), key);
    }

    /// A bare pattern and its `*`-wrapped form select the same keys.
    #[test]
    fn wildcard_wrapping_is_substring(key in "[A-Za-z.]{0,12}", piece in "[a-z]{1,3}") {
        prop_assert_eq!(
            matches_key_pattern(&key, &piece),
            matches_key_pattern(&key, &format!("*{piece}*"))
        );
        prop_assert_eq!(
            matches_key_pattern(&key, &piece),
            key.to_lowercase().contains(&piece)
        );
    }
}

// =============================================================================
// FRESHNESS
// =============================================================================

proptest! {
    /// Ages within the TTL's minute are fresh; ages a minute past it are stale.
    #[test]
    fn freshness_is_minute_granular(now in 1_000_000i64..2_000_000, ttl in 60i64..86_400) {
        let now = Timestamp(now);
        let threshold = now.saturating_sub_secs(ttl);
        let bucket_start = Timestamp(threshold.minute_bucket() * 60);

        prop_assert_eq!(Freshness::evaluate(bucket_start, Some(ttl), now), Freshness::Fresh);
        prop_assert_eq!(
            Freshness::evaluate(bucket_start.saturating_sub_secs(1), Some(ttl), now),
            Freshness::Stale
        );
        prop_assert_eq!(
            Freshness::evaluate(Timestamp::DISTANT_PAST, None, now),
            Freshness::Fresh
        );
    }
}
