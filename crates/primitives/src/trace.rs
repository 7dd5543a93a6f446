//! TraceStore: aircraft state observations with four access paths
//!
//! ## Design
//!
//! TraceStore is a stateless facade over the Database engine. It holds no
//! in-memory state beyond an `Arc<Database>` reference.
//!
//! ## Access Paths
//!
//! | path | key | order |
//! |------|-----|-------|
//! | time | - | `(time, RecordId)` |
//! | identity | `IcaoAddress` | `(time, RecordId)` |
//! | callsign | `Callsign` | `(time, RecordId)` |
//! | squawk | `Squawk` | `(time, RecordId)` |
//!
//! Records without a callsign or squawk are never reachable through those
//! paths. Every query reads a consistent snapshot: a record is either in all
//! of its indexes or in none.
//!
//! ## Thread Safety
//!
//! TraceStore is `Send + Sync`. Appends for unrelated keys proceed in
//! parallel; appends sharing an index bucket serialize on it, waiting at
//! most the configured lock timeout.

use crate::ingest::{compact_track, validate_track, Observation};
use serde::{Deserialize, Serialize};
use skytrace_core::{
    CancellationToken, Callsign, IcaoAddress, RecordId, Result, Squawk, TimeRange, Timestamp,
    TraceRecord,
};
use skytrace_engine::Database;
use skytrace_storage::{AccessPath, TraceStats};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Records returned by queries; payloads are shared, never copied
pub type Traces = Vec<Arc<TraceRecord>>;

/// One identity's use of a callsign or squawk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sighting {
    /// Aircraft
    pub icao_address: IcaoAddress,
    /// Earliest matching record
    pub first_seen: Timestamp,
    /// Latest matching record
    pub last_seen: Timestamp,
    /// Number of matching records
    pub observations: usize,
}

/// Trace record store
///
/// # Example
///
/// ```ignore
/// use skytrace_primitives::TraceStore;
/// use skytrace_engine::Database;
///
/// let db = Database::open("/path/to/data")?;
/// let traces = TraceStore::new(db);
///
/// traces.append(record)?;
/// let history = traces.query_by_identity_and_time(icao, TimeRange::new(t1, t2))?;
/// ```
#[derive(Clone)]
pub struct TraceStore {
    db: Arc<Database>,
}

impl TraceStore {
    /// Create new TraceStore instance
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get the underlying database reference
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    // ========== Writes ==========

    /// Append one record to the store and all applicable indexes
    ///
    /// Duplicates (same time and identity) are kept. The identity need not
    /// be in the reference catalog.
    ///
    /// # Errors
    ///
    /// - `Timeout` (retryable) if an index bucket stayed contended past the
    ///   lock timeout; nothing was written.
    /// - `StorageFailure` / `Io` if the WAL rejected the write, or the
    ///   database is closed; nothing was written.
    pub fn append(&self, record: TraceRecord) -> Result<RecordId> {
        self.db.append_trace(record)
    }

    /// Validate, compact and append one aircraft's observations
    ///
    /// Validation covers the whole track before anything is appended. Each
    /// kept record is then appended on its own; if one append fails, the
    /// ones before it stay.
    pub fn ingest_track(
        &self,
        observations: impl IntoIterator<Item = Observation>,
    ) -> Result<Vec<RecordId>> {
        let records = validate_track(observations)?;
        let received = records.len();
        let kept = compact_track(records);
        debug!(received, kept = kept.len(), "track compacted");
        kept.into_iter().map(|record| self.append(record)).collect()
    }

    // ========== Reads ==========

    /// Look up a record by id
    pub fn get(&self, id: RecordId) -> Option<Arc<TraceRecord>> {
        self.db.traces().get(id)
    }

    /// Records reachable through `path` within `range`, time-ordered
    ///
    /// # Errors
    ///
    /// - `Cancelled` once `cancel` is triggered.
    /// - `Timeout` (retryable) if a bucket stayed write-locked past the
    ///   lock timeout.
    pub fn query(
        &self,
        path: &AccessPath,
        range: &TimeRange,
        cancel: &CancellationToken,
    ) -> Result<Traces> {
        self.db.traces().query(path, range, cancel)
    }

    fn query_uncancelled(&self, path: AccessPath, range: TimeRange) -> Result<Traces> {
        self.query(&path, &range, &CancellationToken::new())
    }

    /// All records within `range`
    pub fn query_by_time(&self, range: TimeRange) -> Result<Traces> {
        self.query_uncancelled(AccessPath::Time, range)
    }

    /// One aircraft's records within `range`
    pub fn query_by_identity_and_time(
        &self,
        icao_address: IcaoAddress,
        range: TimeRange,
    ) -> Result<Traces> {
        self.query_uncancelled(AccessPath::Identity(icao_address), range)
    }

    /// One aircraft's full history
    pub fn query_by_identity(&self, icao_address: IcaoAddress) -> Result<Traces> {
        self.query_by_identity_and_time(icao_address, TimeRange::all())
    }

    /// Records with `callsign` within `range`
    pub fn query_by_callsign_and_time(&self, callsign: &Callsign, range: TimeRange) -> Result<Traces> {
        self.query_uncancelled(AccessPath::Callsign(callsign.clone()), range)
    }

    /// Records with `callsign`, any time
    pub fn query_by_callsign(&self, callsign: &Callsign) -> Result<Traces> {
        self.query_by_callsign_and_time(callsign, TimeRange::all())
    }

    /// Callsign query from raw text
    ///
    /// Blank text never matches anything, since records without a callsign
    /// are not in the callsign index.
    pub fn query_by_callsign_text(&self, callsign: &str, range: TimeRange) -> Result<Traces> {
        match Callsign::new(callsign) {
            Some(callsign) => self.query_by_callsign_and_time(&callsign, range),
            None => Ok(Vec::new()),
        }
    }

    /// Records with `squawk` within `range`
    pub fn query_by_squawk_and_time(&self, squawk: Squawk, range: TimeRange) -> Result<Traces> {
        self.query_uncancelled(AccessPath::Squawk(squawk), range)
    }

    /// Records with `squawk`, any time
    pub fn query_by_squawk(&self, squawk: Squawk) -> Result<Traces> {
        self.query_by_squawk_and_time(squawk, TimeRange::all())
    }

    /// Which aircraft used `callsign`, and when
    pub fn sightings_by_callsign(
        &self,
        callsign: &Callsign,
        cancel: &CancellationToken,
    ) -> Result<Vec<Sighting>> {
        let records = self.query(&AccessPath::Callsign(callsign.clone()), &TimeRange::all(), cancel)?;
        Ok(summarize(&records))
    }

    /// Which aircraft squawked `squawk`, and when
    pub fn sightings_by_squawk(
        &self,
        squawk: Squawk,
        cancel: &CancellationToken,
    ) -> Result<Vec<Sighting>> {
        let records = self.query(&AccessPath::Squawk(squawk), &TimeRange::all(), cancel)?;
        Ok(summarize(&records))
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.db.traces().len()
    }

    /// Check if no record is stored
    pub fn is_empty(&self) -> bool {
        self.db.traces().is_empty()
    }

    /// Size counters
    pub fn stats(&self) -> TraceStats {
        self.db.traces().stats()
    }
}

/// Fold time-ordered records into per-identity sightings, earliest first
fn summarize(records: &[Arc<TraceRecord>]) -> Vec<Sighting> {
    let mut by_identity: BTreeMap<IcaoAddress, Sighting> = BTreeMap::new();
    for record in records {
        by_identity
            .entry(record.icao_address)
            .and_modify(|s| {
                s.last_seen = record.time;
                s.observations += 1;
            })
            .or_insert(Sighting {
                icao_address: record.icao_address,
                first_seen: record.time,
                last_seen: record.time,
                observations: 1,
            });
    }
    let mut sightings: Vec<Sighting> = by_identity.into_values().collect();
    sightings.sort_by_key(|s| (s.first_seen, s.icao_address));
    sightings
}
