//! High-level handle bundling the four components
//!
//! [`Skytrace`] owns one [`Database`] and hands out the component facades
//! over it. Enrichment joins trace records with reference and tag data
//! read-only; nothing is written on the read path.
//!
//! # Example
//!
//! ```text
//! use skytrace::{Skytrace, TimeRange};
//!
//! let db = Skytrace::open("/var/data/adsb")?;
//! let history = db.traces().query_by_identity(icao)?;
//! for row in db.enrich(&history) {
//!     println!("{} {:?} {:?}", row.record.time, row.registration(), row.tags);
//! }
//! db.shutdown()?;
//! ```

use serde::{Deserialize, Serialize};
use skytrace_core::{IcaoAddress, Result, TraceRecord};
use skytrace_engine::{Database, RecoveryStats, SkytraceConfig};
use skytrace_primitives::{AircraftInfo, MetadataStore, ReferenceCatalog, TagIndex, TraceStore};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// One trace record with everything known about its aircraft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedTrace {
    /// The observation
    pub record: TraceRecord,
    /// Registration and model, if cataloged
    pub aircraft: Option<AircraftInfo>,
    /// Tags on the identity
    pub tags: BTreeSet<String>,
}

impl EnrichedTrace {
    /// Tail number, if cataloged
    pub fn registration(&self) -> Option<&str> {
        self.aircraft
            .as_ref()
            .map(|info| info.registration.registration.as_str())
    }
}

/// Aircraft surveillance trace store
///
/// Cheap to clone; clones share the same database.
#[derive(Clone)]
pub struct Skytrace {
    db: Arc<Database>,
    traces: TraceStore,
    catalog: ReferenceCatalog,
    tags: TagIndex,
    metadata: MetadataStore,
}

impl Skytrace {
    /// Open (or create) a store at `path`
    ///
    /// Settings come from `skytrace.toml` in the directory, written with
    /// defaults if missing. Existing data is recovered from the WAL.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_database(Database::open(path)?))
    }

    /// Open (or create) a store at `path`, replacing its config file
    pub fn open_with_config<P: AsRef<Path>>(path: P, cfg: SkytraceConfig) -> Result<Self> {
        Ok(Self::from_database(Database::open_with_config(path, cfg)?))
    }

    /// In-memory store with no persistence
    pub fn ephemeral() -> Self {
        Self::from_database(Database::ephemeral())
    }

    /// Wrap an already opened database
    pub fn from_database(db: Arc<Database>) -> Self {
        Self {
            traces: TraceStore::new(db.clone()),
            catalog: ReferenceCatalog::new(db.clone()),
            tags: TagIndex::new(db.clone()),
            metadata: MetadataStore::new(db.clone()),
            db,
        }
    }

    /// Trace records and their indexes
    pub fn traces(&self) -> &TraceStore {
        &self.traces
    }

    /// Registration and model tables
    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    /// Identity tags
    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    /// Shared metadata documents
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Underlying engine handle
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// What the last open replayed from the WAL
    pub fn recovery_stats(&self) -> RecoveryStats {
        self.db.recovery_stats()
    }

    /// Join records with registration, model and tags
    ///
    /// Output order matches input order. Each identity is looked up once.
    pub fn enrich<'a, I>(&self, records: I) -> Vec<EnrichedTrace>
    where
        I: IntoIterator<Item = &'a Arc<TraceRecord>>,
    {
        let mut known: HashMap<IcaoAddress, (Option<AircraftInfo>, BTreeSet<String>)> =
            HashMap::new();
        let enriched: Vec<EnrichedTrace> = records
            .into_iter()
            .map(|record| {
                let (aircraft, tags) = known
                    .entry(record.icao_address)
                    .or_insert_with(|| {
                        (
                            self.catalog.describe(record.icao_address),
                            self.tags.tags_for(record.icao_address),
                        )
                    })
                    .clone();
                EnrichedTrace {
                    record: (**record).clone(),
                    aircraft,
                    tags,
                }
            })
            .collect();
        debug!(records = enriched.len(), identities = known.len(), "enriched traces");
        enriched
    }

    /// Make everything written so far durable
    pub fn flush(&self) -> Result<()> {
        self.db.flush()
    }

    /// Flush and stop accepting writes; reads keep working
    pub fn shutdown(&self) -> Result<()> {
        self.db.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skytrace_core::TimeRange;

    fn icao(v: u32) -> IcaoAddress {
        IcaoAddress::new(v).unwrap()
    }

    #[test]
    fn test_enrich_keeps_order_and_joins() {
        let db = Skytrace::ephemeral();
        let t = |s: i64| Utc.timestamp_opt(1_700_000_000 + s, 0).unwrap();
        db.traces().append(TraceRecord::new(t(0), icao(2))).unwrap();
        db.traces().append(TraceRecord::new(t(1), icao(1))).unwrap();
        db.catalog().upsert_registration(icao(1), "N1", None).unwrap();
        db.tags().add_tag(icao(2), "mil").unwrap();

        let rows = db.enrich(&db.traces().query_by_time(TimeRange::all()).unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record.icao_address, icao(2));
        assert!(rows[0].aircraft.is_none());
        assert!(rows[0].tags.contains("mil"));
        assert_eq!(rows[1].registration(), Some("N1"));
        assert!(rows[1].tags.is_empty());
    }
}
