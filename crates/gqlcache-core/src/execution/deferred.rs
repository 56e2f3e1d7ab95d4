//! # Possibly-Deferred Values
//!
//! A computation that either already has its value-or-error, or holds a
//! closure that produces it later. Cache reads use the deferred form for
//! reference resolution, which depends on the enclosing transaction still
//! being alive when the value is finally demanded.
//!
//! Composition keeps two guarantees: each closure runs at most once, and
//! the first error (in element order) is the one propagated.

use crate::types::CacheError;

/// A value-or-error now, or a closure that produces one later.
pub enum PossiblyDeferred<'a, T> {
    Immediate(Result<T, CacheError>),
    Deferred(Box<dyn FnOnce() -> Result<T, CacheError> + 'a>),
}

impl<T> std::fmt::Debug for PossiblyDeferred<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(result) => f
                .debug_tuple("Immediate")
                .field(&result.as_ref().map(|_| "..."))
                .finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl<'a, T: 'a> PossiblyDeferred<'a, T> {
    #[must_use]
    pub fn immediate(result: Result<T, CacheError>) -> Self {
        Self::Immediate(result)
    }

    #[must_use]
    pub fn value(value: T) -> Self {
        Self::Immediate(Ok(value))
    }

    #[must_use]
    pub fn error(error: CacheError) -> Self {
        Self::Immediate(Err(error))
    }

    #[must_use]
    pub fn deferred(thunk: impl FnOnce() -> Result<T, CacheError> + 'a) -> Self {
        Self::Deferred(Box::new(thunk))
    }

    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Force the computation.
    pub fn get(self) -> Result<T, CacheError> {
        match self {
            Self::Immediate(result) => result,
            Self::Deferred(thunk) => thunk(),
        }
    }

    #[must_use]
    pub fn map<U: 'a>(self, f: impl FnOnce(T) -> U + 'a) -> PossiblyDeferred<'a, U> {
        match self {
            Self::Immediate(result) => PossiblyDeferred::Immediate(result.map(f)),
            Self::Deferred(thunk) => PossiblyDeferred::deferred(move || thunk().map(f)),
        }
    }

    #[must_use]
    pub fn try_map<U: 'a>(
        self,
        f: impl FnOnce(T) -> Result<U, CacheError> + 'a,
    ) -> PossiblyDeferred<'a, U> {
        match self {
            Self::Immediate(result) => PossiblyDeferred::Immediate(result.and_then(f)),
            Self::Deferred(thunk) => PossiblyDeferred::deferred(move || thunk().and_then(f)),
        }
    }

    /// Chain a computation that may itself be deferred.
    #[must_use]
    pub fn and_then<U: 'a>(
        self,
        f: impl FnOnce(T) -> PossiblyDeferred<'a, U> + 'a,
    ) -> PossiblyDeferred<'a, U> {
        match self {
            Self::Immediate(Ok(value)) => f(value),
            Self::Immediate(Err(error)) => PossiblyDeferred::Immediate(Err(error)),
            Self::Deferred(thunk) => PossiblyDeferred::deferred(move || f(thunk()?).get()),
        }
    }

    #[must_use]
    pub fn map_err(self, f: impl FnOnce(CacheError) -> CacheError + 'a) -> Self {
        match self {
            Self::Immediate(result) => Self::Immediate(result.map_err(f)),
            Self::Deferred(thunk) => Self::deferred(move || thunk().map_err(f)),
        }
    }
}

/// Combine a sequence into one computation over all values.
///
/// Stays immediate when every element is; otherwise defers, forcing the
/// elements in order and stopping at the first error.
#[must_use]
pub fn lazily_evaluate_all<'a, T: 'a>(
    items: Vec<PossiblyDeferred<'a, T>>,
) -> PossiblyDeferred<'a, Vec<T>> {
    if items.iter().any(PossiblyDeferred::is_deferred) {
        PossiblyDeferred::deferred(move || items.into_iter().map(PossiblyDeferred::get).collect())
    } else {
        PossiblyDeferred::Immediate(items.into_iter().map(PossiblyDeferred::get).collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
