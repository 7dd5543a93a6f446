//! Tunables for the in-memory tables

use std::time::Duration;

/// Default bounded wait on a contended index segment
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);
/// Default time-index segment width (one hour, in seconds)
pub const DEFAULT_TIME_BUCKET_SECS: i64 = 3600;
/// Default number of index entries scanned between cancellation checks
pub const DEFAULT_CANCEL_CHECK_INTERVAL: usize = 1024;

/// Tunables shared by every index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSettings {
    /// Maximum wait for a contended segment before `Error::Timeout`
    pub lock_timeout: Duration,
    /// Width of one time-index segment, in seconds
    pub time_bucket_secs: i64,
    /// Index entries scanned between cancellation checks
    pub cancel_check_interval: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            time_bucket_secs: DEFAULT_TIME_BUCKET_SECS,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }
}
