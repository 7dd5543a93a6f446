//! Skytrace - embedded store for aircraft surveillance traces
//!
//! Skytrace keeps ADS-B state observations indexed by time, aircraft
//! identity, callsign and squawk, next to the reference data (registrations,
//! models), identity tags and metadata an application needs to interpret
//! them.
//!
//! # Quick Start
//!
//! ```ignore
//! use skytrace::{Skytrace, TimeRange, TraceRecord, IcaoAddress, Callsign};
//!
//! let db = Skytrace::ephemeral();
//! let icao = IcaoAddress::new(0xabc123)?;
//! db.traces().append(TraceRecord::new(now, icao).with_callsign(Callsign::new("UAL100")))?;
//!
//! let history = db.traces().query_by_identity_and_time(icao, TimeRange::new(t1, t2))?;
//! ```
//!
//! # Architecture
//!
//! The [`Skytrace`] handle bundles four stateless components over one engine
//! [`Database`]. Every mutation is written to the WAL before it becomes
//! visible; reopening a directory replays the WAL.

pub mod skytrace;

pub use skytrace::{EnrichedTrace, Skytrace};

pub use skytrace_core::{
    AircraftModel, AircraftRegistration, CancellationToken, Callsign, DataSource, Error,
    IcaoAddress, RecordId, Result, Squawk, TimeRange, Timestamp, TraceRecord, Wtc,
};
pub use skytrace_engine::{Database, RecoveryStats, SkytraceConfig};
pub use skytrace_primitives::{
    AccessPath, AircraftInfo, MetadataStore, Observation, ReferenceCatalog, SearchQuery, Sighting,
    TagIndex, TraceStats, TraceStore, SCHEMA_VERSION_KEY,
};
