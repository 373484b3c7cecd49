//! Optimistic concurrency primitives.

use crate::error::{DomainError, DomainResult};

/// Anything persisted with a monotonically increasing version.
///
/// The version is bumped exactly once per accepted mutation, so a writer can
/// detect that somebody else changed the record between its read and its write.
pub trait Versioned {
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (initial inserts, administrative fixes).
    Any,
    /// Require the stored record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stale write (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
