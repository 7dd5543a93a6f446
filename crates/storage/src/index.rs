//! Secondary indices for efficient query patterns
//!
//! Every index maps a dimension value to an ordered set of
//! `(time, RecordId)` keys, so a lookup is "find the bucket, then range-scan
//! by time" and never touches unrelated dimension values:
//! - KeyedTimeIndex<K>: identity, callsign and squawk indexes
//! - TimeIndex: the pure time index, segmented into fixed-width time buckets
//!
//! Each bucket sits behind its own `RwLock`. Writers to different buckets
//! never contend; writers to the same bucket serialize on its lock.
//! Readers filter out keys at or above the caller's watermark, so entries of
//! in-flight appends are never returned.

use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use skytrace_concurrency::{read_segment, write_segment, SegmentWriteGuard};
use skytrace_core::{CancellationToken, RecordId, Result, TimeRange, Timestamp};
use std::collections::BTreeSet;
use std::hash::{BuildHasherDefault, Hash};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

/// Ordering key inside every index segment
pub type IndexKey = (Timestamp, RecordId);

/// Ordered keys of one bucket
pub type Segment = BTreeSet<IndexKey>;

type SharedSegment = Arc<RwLock<Segment>>;

type FxBuild = BuildHasherDefault<FxHasher>;

/// Translate a time range into index-key bounds
///
/// Returns `None` for empty ranges so callers never hand an inverted range
/// to `BTreeSet::range` (which panics).
pub fn index_bounds(range: &TimeRange) -> Option<(Bound<IndexKey>, Bound<IndexKey>)> {
    if range.is_empty() {
        return None;
    }
    let start = match range.start() {
        Bound::Included(t) => Bound::Included((t, RecordId::MIN)),
        Bound::Excluded(t) => Bound::Excluded((t, RecordId::MAX)),
        Bound::Unbounded => Bound::Unbounded,
    };
    let end = match range.end() {
        Bound::Included(t) => Bound::Included((t, RecordId::MAX)),
        Bound::Excluded(t) => Bound::Excluded((t, RecordId::MIN)),
        Bound::Unbounded => Bound::Unbounded,
    };
    Some((start, end))
}

/// Per-scan bookkeeping: visibility cutoff and cancellation polling
pub struct ScanContext<'a> {
    watermark: RecordId,
    lock_timeout: Duration,
    cancel: &'a CancellationToken,
    check_interval: usize,
    scanned: usize,
}

impl<'a> ScanContext<'a> {
    /// Context for one query
    pub fn new(
        watermark: RecordId,
        lock_timeout: Duration,
        cancel: &'a CancellationToken,
        check_interval: usize,
    ) -> Self {
        Self {
            watermark,
            lock_timeout,
            cancel,
            check_interval: check_interval.max(1),
            scanned: 0,
        }
    }

    /// Entries examined so far
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    fn tick(&mut self) -> Result<()> {
        self.scanned += 1;
        if self.scanned % self.check_interval == 0 {
            self.cancel.check()?;
        }
        Ok(())
    }

    fn collect(
        &mut self,
        segment: &RwLock<Segment>,
        bounds: (Bound<IndexKey>, Bound<IndexKey>),
        resource: &str,
        out: &mut Vec<IndexKey>,
    ) -> Result<()> {
        let guard = read_segment(segment, self.lock_timeout, resource)?;
        for key in guard.range(bounds) {
            self.tick()?;
            if key.1 < self.watermark {
                out.push(*key);
            }
        }
        Ok(())
    }
}

/// Secondary index: dimension value → ordered `(time, RecordId)` keys
#[derive(Debug)]
pub struct KeyedTimeIndex<K: Eq + Hash> {
    name: &'static str,
    buckets: DashMap<K, SharedSegment, FxBuild>,
}

impl<K: Eq + Hash + Clone> KeyedTimeIndex<K> {
    /// Create an empty index; `name` labels lock timeouts
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            buckets: DashMap::with_hasher(FxBuild::default()),
        }
    }

    /// Index name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Lock the bucket for `key` for writing, creating it if needed
    ///
    /// A bucket created here is removed again if the lock cannot be taken
    /// and nobody else is using it.
    pub fn lock_bucket(&self, key: &K, timeout: Duration) -> Result<SegmentWriteGuard<Segment>> {
        // Release the map shard before waiting on the bucket itself
        let segment = self.buckets.entry(key.clone()).or_default().clone();
        let locked = write_segment(&segment, timeout, self.name);
        if locked.is_err() {
            drop(segment);
            self.prune(key);
        }
        locked
    }

    /// Remove `key`'s bucket if it is empty and no writer or reader holds it
    ///
    /// Returns whether a bucket was removed.
    pub fn prune(&self, key: &K) -> bool {
        self.prune_then(key, || {})
    }

    /// Like [`prune`](Self::prune), running `on_removed` before the map
    /// shard is released
    fn prune_then(&self, key: &K, on_removed: impl FnOnce()) -> bool {
        // The map's own reference is the only one left, and new ones are only
        // handed out under the shard lock held here
        self.buckets
            .remove_if(key, |_, segment| {
                let unused = Arc::strong_count(segment) == 1
                    && segment.try_read().map_or(false, |keys| keys.is_empty());
                if unused {
                    on_removed();
                }
                unused
            })
            .is_some()
    }

    /// Append visible keys of `key`'s bucket inside `range` to `out`
    pub fn scan(
        &self,
        key: &K,
        range: &TimeRange,
        ctx: &mut ScanContext<'_>,
        out: &mut Vec<IndexKey>,
    ) -> Result<()> {
        let Some(bounds) = index_bounds(range) else {
            return Ok(());
        };
        let segment = match self.buckets.get(key) {
            Some(segment) => segment.clone(),
            None => return Ok(()),
        };
        ctx.collect(&segment, bounds, self.name, out)
    }

    /// Number of distinct dimension values indexed
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Primary time index, segmented by fixed-width time buckets
///
/// A directory of bucket numbers keeps range scans proportional to the
/// buckets that actually exist rather than to the width of the range.
#[derive(Debug)]
pub struct TimeIndex {
    bucket_secs: i64,
    segments: KeyedTimeIndex<i64>,
    directory: RwLock<BTreeSet<i64>>,
}

impl TimeIndex {
    /// Create an index with `bucket_secs`-wide segments
    pub fn new(bucket_secs: i64) -> Self {
        Self {
            bucket_secs: bucket_secs.max(1),
            segments: KeyedTimeIndex::new("time index"),
            directory: RwLock::new(BTreeSet::new()),
        }
    }

    /// Bucket number containing `t`
    pub fn bucket_of(&self, t: &Timestamp) -> i64 {
        t.timestamp().div_euclid(self.bucket_secs)
    }

    /// Lock the segment covering `t` for writing, creating it if needed
    ///
    /// The bucket enters the directory only once its segment is held.
    pub fn lock_bucket(&self, t: &Timestamp, timeout: Duration) -> Result<SegmentWriteGuard<Segment>> {
        let bucket = self.bucket_of(t);
        let guard = self.segments.lock_bucket(&bucket, timeout)?;
        if !self.directory.read().contains(&bucket) {
            self.directory.write().insert(bucket);
        }
        Ok(guard)
    }

    /// Remove the segment covering `t`, and its directory entry, if it is
    /// empty and unused
    pub fn prune(&self, t: &Timestamp) -> bool {
        let bucket = self.bucket_of(t);
        self.segments.prune_then(&bucket, || {
            self.directory.write().remove(&bucket);
        })
    }

    /// Append visible keys inside `range` to `out`, in time order
    pub fn scan(
        &self,
        range: &TimeRange,
        ctx: &mut ScanContext<'_>,
        out: &mut Vec<IndexKey>,
    ) -> Result<()> {
        if range.is_empty() {
            return Ok(());
        }
        let first = match range.start() {
            Bound::Included(t) | Bound::Excluded(t) => Bound::Included(self.bucket_of(&t)),
            Bound::Unbounded => Bound::Unbounded,
        };
        let last = match range.end() {
            Bound::Included(t) | Bound::Excluded(t) => Bound::Included(self.bucket_of(&t)),
            Bound::Unbounded => Bound::Unbounded,
        };
        let buckets: Vec<i64> = read_segment(&self.directory, ctx.lock_timeout, "time directory")?
            .range((first, last))
            .copied()
            .collect();

        // Buckets are disjoint and ascending, so concatenation stays sorted
        for bucket in buckets {
            self.segments.scan(&bucket, range, ctx, out)?;
        }
        Ok(())
    }

    /// Number of time segments
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Segment width in seconds
    pub fn bucket_secs(&self) -> i64 {
        self.bucket_secs
    }
}
