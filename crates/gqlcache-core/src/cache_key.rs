//! # Cache-Key Algebra
//!
//! Parsing and reparenting of composite cache keys.
//!
//! A field key is a record key followed by `.` and a field name. Segments
//! that carry an argument list may contain literal dots (a JSON-encoded
//! argument, for instance), so splitting respects balanced parentheses.
//!
//! Every function here is pure and deterministic; the merge layer relies on
//! `record_key_of` as a grouping key.

use crate::primitives::ROOT_MARKER;
use crate::types::CacheKey;

/// Whether every `(` in `segment` is closed.
///
/// A stray `)` with nothing open is ignored.
fn is_balanced(segment: &str) -> bool {
    let mut open = 0usize;
    for c in segment.chars() {
        match c {
            '(' => open = open.saturating_add(1),
            ')' => open = open.saturating_sub(1),
            _ => {}
        }
    }
    open == 0
}

/// Split a key on `.`, keeping parenthesized argument lists whole.
///
/// Segments of a naive dot-split are buffered while the parentheses are
/// unbalanced and emitted as one segment once they balance. An unbalanced
/// tail is emitted as-is.
#[must_use]
pub fn split_components(key: &str) -> Vec<String> {
    let mut components = Vec::new();
    let mut pending: Option<String> = None;

    for segment in key.split('.') {
        let candidate = match pending.take() {
            Some(mut buffer) => {
                buffer.push('.');
                buffer.push_str(segment);
                buffer
            }
            None => segment.to_string(),
        };

        if is_balanced(&candidate) {
            components.push(candidate);
        } else {
            pending = Some(candidate);
        }
    }

    if let Some(buffer) = pending {
        components.push(buffer);
    }
    components
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Attach every purely numeric segment to its predecessor.
///
/// `["hero", "friends", "0"]` becomes `["hero", "friends.0"]`: list indices
/// belong to their containing field. A leading index has no predecessor and
/// stays on its own.
#[must_use]
pub fn collapse_index_components(components: Vec<String>) -> Vec<String> {
    let mut collapsed: Vec<String> = Vec::with_capacity(components.len());
    for component in components {
        match collapsed.last_mut() {
            Some(previous) if is_index(&component) => {
                previous.push('.');
                previous.push_str(&component);
            }
            _ => collapsed.push(component),
        }
    }
    collapsed
}

/// Key of the record that owns the field at `field_key`.
///
/// Splits the key, collapses index segments when the first segment is an
/// operation root, then drops the leaf. A key with fewer than two segments
/// maps to itself.
#[must_use]
pub fn record_key_of(field_key: &str) -> CacheKey {
    let mut components = split_components(field_key);
    if components
        .first()
        .is_some_and(|first| first.contains(ROOT_MARKER))
    {
        components = collapse_index_components(components);
    }

    if components.len() > 1 {
        components.pop();
    }
    components.join(".")
}

/// Field key of `field` within the record at `record_key`.
#[must_use]
pub fn field_key(record_key: &str, field: &str) -> CacheKey {
    format!("{record_key}.{field}")
}

/// Case-insensitive pattern match used by pattern eviction.
///
/// `*` is a wildcard; the literal pieces between wildcards must appear in the
/// key in order. A pattern without wildcards is a substring match, so `hero`
/// and `*hero*` select the same keys. A pattern made only of wildcards (or
/// empty) matches everything.
#[must_use]
pub fn matches_key_pattern(key: &str, pattern: &str) -> bool {
    let key = key.to_lowercase();
    let pattern = pattern.to_lowercase();

    let mut rest = key.as_str();
    for piece in pattern.split('*').filter(|piece| !piece.is_empty()) {
        match rest.find(piece) {
            Some(at) => rest = &rest[at + piece.len()..],
            None => return false,
        }
    }
    true
}

// =============================================================================
// TESTS
// =============================================================================
