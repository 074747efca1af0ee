//! Recoverable errors of the harness primitives.
//!
//! Only argument validation is reported as a value. Resource exhaustion
//! (a worker thread that cannot be spawned) goes through [`crate::report::fatal`]
//! instead, because a test run must not continue with a degraded thread set.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A count or capacity was outside its accepted range.
    #[error("invalid argument: {what} = {value} (must be >= 1)")]
    InvalidArgument { what: &'static str, value: i64 },
    /// Per-worker arguments did not match the configured group size.
    #[error("argument count {got} does not match group size {expected}")]
    ArgumentCountMismatch { expected: usize, got: usize },
}

impl SyncError {
    pub(crate) fn invalid(what: &'static str, value: impl TryInto<i64>) -> Self {
        Self::InvalidArgument {
            what,
            value: value.try_into().unwrap_or(i64::MAX),
        }
    }

    /// Returns true for the `InvalidArgument` condition.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}
