//! Trace tables: the record arena plus its four secondary indexes
//!
//! ## Write path
//!
//! ```text
//! 1. lock buckets in fixed order: time → identity → callsign → squawk
//! 2. reserve RecordId
//! 3. log(record)          - write-ahead hook; failure aborts with no change
//! 4. payload into the arena, insert (time, id) into every locked bucket
//! 5. release buckets, finish(id) - record becomes visible to new scans
//! ```
//!
//! The fixed lock order means two appends can never wait on each other in a
//! cycle; the bounded wait turns heavy contention into a retryable
//! `Timeout` before any state changes. Buckets created by an append that
//! then fails are removed again if they stayed empty.
//!
//! Records with no callsign or squawk never touch those indexes.

use crate::arena::RecordArena;
use crate::index::{IndexKey, KeyedTimeIndex, ScanContext, Segment, TimeIndex};
use crate::settings::IndexSettings;
use skytrace_concurrency::{CommitTracker, SegmentWriteGuard};
use skytrace_core::{
    CancellationToken, Callsign, IcaoAddress, RecordId, Result, Squawk, TimeRange, TraceRecord,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Which index a query enters through
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessPath {
    /// Time alone
    Time,
    /// One aircraft identity
    Identity(IcaoAddress),
    /// One callsign
    Callsign(Callsign),
    /// One squawk code
    Squawk(Squawk),
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPath::Time => write!(f, "time"),
            AccessPath::Identity(icao) => write!(f, "identity {}", icao),
            AccessPath::Callsign(callsign) => write!(f, "callsign {}", callsign),
            AccessPath::Squawk(squawk) => write!(f, "squawk {}", squawk),
        }
    }
}

/// Size counters for the trace tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceStats {
    /// Stored records
    pub records: usize,
    /// Distinct identities indexed
    pub identities: usize,
    /// Distinct callsigns indexed
    pub callsigns: usize,
    /// Distinct squawks indexed
    pub squawks: usize,
    /// Time-index segments
    pub time_segments: usize,
    /// Appends reserved but not yet visible
    pub in_flight: u64,
}

/// Buckets one append holds while it writes
struct LockedBuckets {
    time: SegmentWriteGuard<Segment>,
    identity: SegmentWriteGuard<Segment>,
    callsign: Option<SegmentWriteGuard<Segment>>,
    squawk: Option<SegmentWriteGuard<Segment>>,
}

impl LockedBuckets {
    fn insert(&mut self, key: IndexKey) {
        self.time.insert(key);
        self.identity.insert(key);
        if let Some(bucket) = self.callsign.as_mut() {
            bucket.insert(key);
        }
        if let Some(bucket) = self.squawk.as_mut() {
            bucket.insert(key);
        }
    }
}

/// Arena + time/identity/callsign/squawk indexes
#[derive(Debug)]
pub struct TraceTables {
    settings: IndexSettings,
    tracker: CommitTracker,
    arena: RecordArena,
    time: TimeIndex,
    identity: KeyedTimeIndex<IcaoAddress>,
    callsign: KeyedTimeIndex<Callsign>,
    squawk: KeyedTimeIndex<Squawk>,
}

impl TraceTables {
    /// Empty tables
    pub fn new(settings: IndexSettings) -> Self {
        Self {
            settings,
            tracker: CommitTracker::new(),
            arena: RecordArena::new(),
            time: TimeIndex::new(settings.time_bucket_secs),
            identity: KeyedTimeIndex::new("identity index"),
            callsign: KeyedTimeIndex::new("callsign index"),
            squawk: KeyedTimeIndex::new("squawk index"),
        }
    }

    /// Active settings
    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Append a record to the arena and every applicable index
    ///
    /// `log` runs after all buckets are held and before anything is
    /// inserted. If it fails, the record is discarded and its id is retired
    /// without ever becoming visible. The id is retired as well if `log`
    /// panics.
    pub fn append_with<F>(&self, record: TraceRecord, log: F) -> Result<RecordId>
    where
        F: FnOnce(&TraceRecord) -> Result<()>,
    {
        let mut buckets = match self.lock_buckets(&record) {
            Ok(buckets) => buckets,
            Err(e) => {
                self.prune_buckets(&record);
                return Err(e);
            }
        };

        let reservation = self.tracker.begin();
        if let Err(e) = log(&record) {
            drop(reservation);
            drop(buckets);
            self.prune_buckets(&record);
            return Err(e);
        }

        let id = reservation.id();
        debug!(
            %id,
            icao = %record.icao_address,
            time = %record.time,
            callsign = ?record.callsign,
            squawk = ?record.squawk,
            "trace appended"
        );
        let time = record.time;
        self.arena.insert(id, record);
        buckets.insert((time, id));

        drop(buckets);
        drop(reservation);
        Ok(id)
    }

    fn lock_buckets(&self, record: &TraceRecord) -> Result<LockedBuckets> {
        let timeout = self.settings.lock_timeout;
        Ok(LockedBuckets {
            time: self.time.lock_bucket(&record.time, timeout)?,
            identity: self.identity.lock_bucket(&record.icao_address, timeout)?,
            callsign: match &record.callsign {
                Some(callsign) => Some(self.callsign.lock_bucket(callsign, timeout)?),
                None => None,
            },
            squawk: match &record.squawk {
                Some(squawk) => Some(self.squawk.lock_bucket(squawk, timeout)?),
                None => None,
            },
        })
    }

    /// Drop buckets a failed append created and left empty
    fn prune_buckets(&self, record: &TraceRecord) {
        self.time.prune(&record.time);
        self.identity.prune(&record.icao_address);
        if let Some(callsign) = &record.callsign {
            self.callsign.prune(callsign);
        }
        if let Some(squawk) = &record.squawk {
            self.squawk.prune(squawk);
        }
    }

    /// Start a scan pinned to the current watermark
    ///
    /// Every `scan_into` made with the returned context sees the same set of
    /// records, even while appends continue.
    pub fn begin_scan<'a>(&self, cancel: &'a CancellationToken) -> ScanContext<'a> {
        ScanContext::new(
            self.tracker.watermark(),
            self.settings.lock_timeout,
            cancel,
            self.settings.cancel_check_interval,
        )
    }

    /// Append the visible index keys for `path` within `range` to `out`
    pub fn scan_into(
        &self,
        ctx: &mut ScanContext<'_>,
        path: &AccessPath,
        range: &TimeRange,
        out: &mut Vec<IndexKey>,
    ) -> Result<()> {
        match path {
            AccessPath::Time => self.time.scan(range, ctx, out),
            AccessPath::Identity(icao) => self.identity.scan(icao, range, ctx, out),
            AccessPath::Callsign(callsign) => self.callsign.scan(callsign, range, ctx, out),
            AccessPath::Squawk(squawk) => self.squawk.scan(squawk, range, ctx, out),
        }
    }

    /// Resolve index keys to records, preserving order
    pub fn resolve(&self, keys: &[IndexKey]) -> Vec<Arc<TraceRecord>> {
        keys.iter()
            .filter_map(|(_, id)| {
                let record = self.arena.get(*id);
                debug_assert!(record.is_some(), "visible id {} missing from arena", id);
                record
            })
            .collect()
    }

    /// Records for `path` within `range`, ordered by `(time, RecordId)`
    pub fn query(
        &self,
        path: &AccessPath,
        range: &TimeRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<TraceRecord>>> {
        cancel.check()?;
        let mut ctx = self.begin_scan(cancel);
        let mut keys = Vec::new();
        self.scan_into(&mut ctx, path, range, &mut keys)?;
        debug!(%path, scanned = ctx.scanned(), matched = keys.len(), "trace query");
        Ok(self.resolve(&keys))
    }

    /// Look up one record by id, if visible
    pub fn get(&self, id: RecordId) -> Option<Arc<TraceRecord>> {
        if self.tracker.is_visible(id) {
            self.arena.get(id)
        } else {
            None
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Check if no record is stored
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Size counters
    pub fn stats(&self) -> TraceStats {
        TraceStats {
            records: self.arena.len(),
            identities: self.identity.len(),
            callsigns: self.callsign.len(),
            squawks: self.squawk.len(),
            time_segments: self.time.segment_count(),
            in_flight: self.tracker.in_flight(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skytrace_core::{Error, Timestamp};

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn icao(v: u32) -> IcaoAddress {
        IcaoAddress::new(v).unwrap()
    }

    fn no_log(_: &TraceRecord) -> Result<()> {
        Ok(())
    }

    fn tables() -> TraceTables {
        TraceTables::new(IndexSettings::default())
    }

    #[test]
    fn test_append_indexes_all_dimensions() {
        let t = tables();
        let record = TraceRecord::new(ts(0), icao(0xabc123))
            .with_callsign(Callsign::new("UAL100"))
            .with_squawk(Some(Squawk::new(0o1200)));
        t.append_with(record, no_log).unwrap();

        let stats = t.stats();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.identities, 1);
        assert_eq!(stats.callsigns, 1);
        assert_eq!(stats.squawks, 1);
        assert_eq!(stats.time_segments, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[test]
    fn test_absent_optional_fields_skip_indexes() {
        let t = tables();
        t.append_with(TraceRecord::new(ts(0), icao(1)), no_log).unwrap();

        let stats = t.stats();
        assert_eq!(stats.callsigns, 0);
        assert_eq!(stats.squawks, 0);

        let cancel = CancellationToken::new();
        assert_eq!(t.query(&AccessPath::Time, &TimeRange::all(), &cancel).unwrap().len(), 1);
        assert_eq!(
            t.query(&AccessPath::Identity(icao(1)), &TimeRange::all(), &cancel).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_failed_log_leaves_no_trace() {
        let t = tables();
        let record = TraceRecord::new(ts(0), icao(2)).with_callsign(Callsign::new("DLH1"));
        let err = t
            .append_with(record, |_| Err(Error::StorageFailure("disk gone".into())))
            .unwrap_err();
        assert!(err.is_storage_failure());

        assert!(t.is_empty());
        let cancel = CancellationToken::new();
        for path in [
            AccessPath::Time,
            AccessPath::Identity(icao(2)),
            AccessPath::Callsign(Callsign::new("DLH1").unwrap()),
        ] {
            assert!(t.query(&path, &TimeRange::all(), &cancel).unwrap().is_empty());
        }

        // The retired id does not stall later appends
        let id = t.append_with(TraceRecord::new(ts(1), icao(2)), no_log).unwrap();
        assert!(t.get(id).is_some());
    }

    #[test]
    fn test_contended_bucket_times_out_without_writing() {
        let settings = IndexSettings {
            lock_timeout: std::time::Duration::from_millis(5),
            ..IndexSettings::default()
        };
        let t = TraceTables::new(settings);
        let _held = t
            .identity
            .lock_bucket(&icao(3), std::time::Duration::from_millis(5))
            .unwrap();

        let err = t
            .append_with(TraceRecord::new(ts(0), icao(3)), no_log)
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(t.is_empty());
        assert_eq!(t.stats().in_flight, 0);
    }

    #[test]
    fn test_timed_out_append_leaves_no_empty_buckets() {
        let settings = IndexSettings {
            lock_timeout: std::time::Duration::from_millis(5),
            ..IndexSettings::default()
        };
        let t = TraceTables::new(settings);
        let _held = t
            .squawk
            .lock_bucket(&Squawk::EMERGENCY, std::time::Duration::from_millis(5))
            .unwrap();

        // Time, identity and callsign buckets are created and locked before
        // the squawk bucket times out
        let record = TraceRecord::new(ts(0), icao(3))
            .with_callsign(Callsign::new("SWR8"))
            .with_squawk(Some(Squawk::EMERGENCY));
        assert!(t.append_with(record, no_log).unwrap_err().is_retryable());

        let stats = t.stats();
        assert_eq!(stats.time_segments, 0);
        assert_eq!(stats.identities, 0);
        assert_eq!(stats.callsigns, 0);
        assert_eq!(stats.squawks, 1, "the held bucket stays");

        let cancel = CancellationToken::new();
        assert!(t.query(&AccessPath::Time, &TimeRange::all(), &cancel).unwrap().is_empty());
    }

    #[test]
    fn test_failed_log_keeps_buckets_of_earlier_records() {
        let t = tables();
        t.append_with(TraceRecord::new(ts(0), icao(6)), no_log).unwrap();
        let before = t.stats();

        let err = t.append_with(TraceRecord::new(ts(1), icao(6)), |_| {
            Err(Error::StorageFailure("disk gone".into()))
        });
        assert!(err.is_err());
        assert_eq!(t.stats(), before);

        t.append_with(TraceRecord::new(ts(2), icao(7)), |_| {
            Err(Error::StorageFailure("disk gone".into()))
        })
        .unwrap_err();
        assert_eq!(t.stats().identities, before.identities);
    }

    #[test]
    fn test_panicking_log_hook_does_not_stall_later_appends() {
        let t = tables();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = t.append_with(TraceRecord::new(ts(0), icao(8)), |_| panic!("log hook died"));
        }));
        assert!(result.is_err());
        assert_eq!(t.stats().in_flight, 0);

        let id = t.append_with(TraceRecord::new(ts(1), icao(8)), no_log).unwrap();
        assert!(t.get(id).is_some());
        let cancel = CancellationToken::new();
        let found = t
            .query(&AccessPath::Identity(icao(8)), &TimeRange::all(), &cancel)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].time, ts(1));
    }

    #[test]
    fn test_query_orders_out_of_order_arrivals() {
        let t = tables();
        for secs in [30, 10, 20] {
            t.append_with(TraceRecord::new(ts(secs), icao(4)), no_log).unwrap();
        }
        let cancel = CancellationToken::new();
        let times: Vec<_> = t
            .query(&AccessPath::Identity(icao(4)), &TimeRange::all(), &cancel)
            .unwrap()
            .iter()
            .map(|r| r.time)
            .collect();
        assert_eq!(times, vec![ts(10), ts(20), ts(30)]);
    }

    #[test]
    fn test_duplicate_observations_are_both_kept() {
        let t = tables();
        let record = TraceRecord::new(ts(0), icao(5));
        let a = t.append_with(record.clone(), no_log).unwrap();
        let b = t.append_with(record, no_log).unwrap();
        assert_ne!(a, b);

        let cancel = CancellationToken::new();
        let found = t.query(&AccessPath::Time, &TimeRange::at(ts(0)), &cancel).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_cancelled_token_rejects_query_up_front() {
        let t = tables();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = t.query(&AccessPath::Time, &TimeRange::all(), &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
