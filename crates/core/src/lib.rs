//! Core types for skytrace
//!
//! This crate defines the foundational types used throughout the system:
//! - IcaoAddress, Squawk, Callsign, DataSource, Wtc: surveillance identifiers
//! - TraceRecord: one observed state update
//! - AircraftRegistration, AircraftModel: reference rows
//! - TimeRange, RecordId: query and index vocabulary
//! - Error: Error type hierarchy
//! - CancellationToken: cooperative scan cancellation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod record;
pub mod types;

pub use cancel::CancellationToken;
pub use error::{Error, Result};
pub use record::{AircraftModel, AircraftRegistration, TraceRecord};
pub use types::{
    Callsign, DataSource, IcaoAddress, RecordId, Squawk, TimeRange, Timestamp, Wtc,
    MAX_ICAO_ADDRESS,
};
