//! Unified error types for kstat-reader.
//!
//! This module provides a single error type covering every failure the crate
//! can surface, from missing records to backend I/O problems.

use thiserror::Error;

/// All kstat-reader errors.
///
/// This is the canonical error type for all registry operations. Search
/// misses, missing value keys and an unset cursor all report `NotFound`;
/// callers are expected to check for it on every search.
#[derive(Debug, Error)]
pub enum Error {
    /// No record matched, a value key does not exist, or the cursor holds
    /// no position.
    #[error("not found: {0}")]
    NotFound(String),

    /// A named-value lookup was attempted on a record whose kind does not
    /// carry named values.
    #[error("not a named record: {0}")]
    NotNamedRecord(String),

    /// A typed accessor requested a kind that does not match the stored tag.
    ///
    /// Numeric widths never coerce: a stored unsigned-64 read through the
    /// signed-32 accessor fails here rather than truncating or widening.
    #[error("type mismatch for {name:?}: requested {requested}, stored {actual}")]
    TypeMismatch {
        /// The value key that was looked up.
        name: String,
        /// Kind implied by the accessor that was called.
        requested: &'static str,
        /// Kind actually stored in the record.
        actual: &'static str,
    },

    /// The registry session has been closed.
    #[error("registry is closed")]
    Closed,

    /// A record handle outlived its chain generation before its data was
    /// fetched.
    #[error("stale record handle: held generation {held}, current {current}")]
    StaleHandle {
        /// Generation the handle was created in.
        held: u64,
        /// Generation the registry is currently at.
        current: u64,
    },

    /// Failure reported by the external statistics facility.
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error from the external statistics facility.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for kstat-reader operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a type-mismatch error.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Error::TypeMismatch { .. })
    }

    /// Check if this error is retryable.
    ///
    /// External facility failures are fatal to the current operation but not
    /// to the registry; the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Backend(_) | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(!Error::Closed.is_not_found());
    }

    #[test]
    fn test_retryable_classes() {
        assert!(Error::Backend("chain update failed".into()).is_retryable());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "eio");
        assert!(Error::Io(io).is_retryable());
        assert!(!Error::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_type_mismatch_display_names_both_kinds() {
        let err = Error::TypeMismatch {
            name: "anonfree".into(),
            requested: "int32",
            actual: "uint64",
        };
        let msg = err.to_string();
        assert!(msg.contains("int32"));
        assert!(msg.contains("uint64"));
    }
}
