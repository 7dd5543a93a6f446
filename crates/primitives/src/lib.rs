//! Primitives layer for skytrace
//!
//! Provides the public components as stateless facades over the Database engine:
//! - **TraceStore**: time-ordered state observations with identity, callsign
//!   and squawk access paths, multi-key search and track ingestion
//! - **ReferenceCatalog**: registration and model reference tables
//! - **TagIndex**: unique (identity, tag) labels with reverse lookup
//! - **MetadataStore**: shared JSON documents keyed by name
//!
//! ## Design Principle: Stateless Facades
//!
//! All primitives are logically stateful but operationally stateless.
//! They hold only an `Arc<Database>` reference and delegate all operations
//! to the engine. This means:
//!
//! - Multiple primitive instances on the same Database are safe
//! - No warm-up or cache invalidation concerns
//! - WAL replay rebuilds exactly what the facades observe

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod ingest;
pub mod metadata;
pub mod search;
pub mod tags;
pub mod trace;

pub use catalog::{AircraftInfo, ReferenceCatalog};
pub use ingest::{compact_track, validate_track, Observation, TrackCompactor};
pub use metadata::{MetadataStore, SCHEMA_VERSION_KEY};
pub use search::SearchQuery;
pub use tags::TagIndex;
pub use trace::{Sighting, TraceStore, Traces};

pub use skytrace_storage::{AccessPath, TraceStats};
