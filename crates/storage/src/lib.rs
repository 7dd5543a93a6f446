//! Storage layer for skytrace
//!
//! This crate implements the in-memory tables behind every component:
//! - RecordArena: RecordId → immutable TraceRecord
//! - TimeIndex / KeyedTimeIndex: ordered `(time, RecordId)` secondary indexes
//! - TraceTables: arena + time/identity/callsign/squawk indexes, watermark-gated
//! - CatalogTables: registrations (with tail-number reverse index) and models
//! - TagTables: identity ↔ tag relation in both directions
//! - MetadataTable: key → JSON document
//!
//! Every mutation takes a `log` hook that runs once the affected keys are
//! locked and before anything changes, so a write-ahead log failure leaves
//! the tables untouched.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod catalog;
pub mod index;
pub mod metadata;
pub mod settings;
pub mod tags;
pub mod trace;

pub use arena::RecordArena;
pub use catalog::CatalogTables;
pub use index::{IndexKey, KeyedTimeIndex, ScanContext, TimeIndex};
pub use metadata::MetadataTable;
pub use settings::{
    IndexSettings, DEFAULT_CANCEL_CHECK_INTERVAL, DEFAULT_LOCK_TIMEOUT, DEFAULT_TIME_BUCKET_SECS,
};
pub use tags::TagTables;
pub use trace::{AccessPath, TraceStats, TraceTables};
