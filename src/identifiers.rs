//! Type-safe identifiers for jobs, link epochs and devices.
//!
//! Newtype wrappers keep a job id from being mixed up with an epoch, and
//! give device references a single place to normalize.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// JobId
// ============================================================================

/// Process-wide counter for job ids.
static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one queued command job.
///
/// Ids increase monotonically in creation order and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(u64);

impl JobId {
    /// Allocates the next job id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

// ============================================================================
// Epoch
// ============================================================================

/// Generation number of one attempt at establishing the link.
///
/// Every signal, completion and timer is tagged with the epoch it belongs
/// to; anything tagged with an older epoch is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Epoch(u64);

impl Epoch {
    /// The epoch before the first `start`.
    pub const INITIAL: Self = Self(0);

    /// Returns the following epoch.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// DeviceRef
// ============================================================================

/// Opaque reference to a registered device (e.g. `ARC_A_1`).
///
/// The supervisor never interprets it; it is only handed to the
/// [`DeviceResolver`](crate::DeviceResolver).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRef(String);

impl DeviceRef {
    /// Creates a device reference.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the reference as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceRef {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&DeviceRef> for DeviceRef {
    fn from(id: &DeviceRef) -> Self {
        id.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
