//! Bounded-wait acquisition of index segments
//!
//! Every index bucket sits behind its own `RwLock`. Writers and readers wait
//! at most the configured timeout and then fail with a retryable
//! [`Error::Timeout`] instead of blocking indefinitely.

use parking_lot::{ArcRwLockWriteGuard, RawRwLock, RwLock, RwLockReadGuard};
use skytrace_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Owned write guard over a shared segment
///
/// Owned so that one writer can hold segments of several indexes at once
/// while it applies a record.
pub type SegmentWriteGuard<T> = ArcRwLockWriteGuard<RawRwLock, T>;

/// Take a segment for writing, waiting at most `timeout`
pub fn write_segment<T>(
    segment: &Arc<RwLock<T>>,
    timeout: Duration,
    resource: &str,
) -> Result<SegmentWriteGuard<T>> {
    segment.try_write_arc_for(timeout).ok_or_else(|| {
        warn!(resource, ?timeout, "index segment write lock timed out");
        Error::Timeout {
            resource: resource.to_string(),
            waited: timeout,
        }
    })
}

/// Take a segment for reading, waiting at most `timeout`
pub fn read_segment<'a, T>(
    segment: &'a RwLock<T>,
    timeout: Duration,
    resource: &str,
) -> Result<RwLockReadGuard<'a, T>> {
    segment.try_read_for(timeout).ok_or_else(|| {
        warn!(resource, ?timeout, "index segment read lock timed out");
        Error::Timeout {
            resource: resource.to_string(),
            waited: timeout,
        }
    })
}
