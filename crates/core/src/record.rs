//! Stored record types
//!
//! - TraceRecord: one observed state update (immutable once appended)
//! - AircraftRegistration: identity → registration/model row
//! - AircraftModel: model code → descriptive attributes row

use crate::types::{Callsign, DataSource, IcaoAddress, Squawk, Timestamp, Wtc};
use serde::{Deserialize, Serialize};

/// One observed aircraft state update
///
/// Only `time` and `icao_address` are required. Absent optional fields are
/// `None` and keep the record out of the corresponding secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Observation time
    pub time: Timestamp,
    /// Aircraft identity
    pub icao_address: IcaoAddress,
    /// Flight identifier, if known
    pub callsign: Option<Callsign>,
    /// Transponder code, if known
    pub squawk: Option<Squawk>,
    /// Feed/receiver tag, if known
    pub data_source: Option<DataSource>,
}

impl TraceRecord {
    /// Record with only the required fields
    pub fn new(time: Timestamp, icao_address: IcaoAddress) -> Self {
        Self {
            time,
            icao_address,
            callsign: None,
            squawk: None,
            data_source: None,
        }
    }

    /// Set the callsign (`None` keeps it absent)
    pub fn with_callsign(mut self, callsign: Option<Callsign>) -> Self {
        self.callsign = callsign;
        self
    }

    /// Set the squawk
    pub fn with_squawk(mut self, squawk: Option<Squawk>) -> Self {
        self.squawk = squawk;
        self
    }

    /// Set the data source tag
    pub fn with_data_source(mut self, data_source: Option<DataSource>) -> Self {
        self.data_source = data_source;
        self
    }
}

/// Registry row for one aircraft identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftRegistration {
    /// Primary key
    pub icao_address: IcaoAddress,
    /// Tail number
    pub registration: String,
    /// ICAO model code; not required to exist in the model table
    pub model: Option<String>,
}

/// Descriptive row for one ICAO model code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftModel {
    /// Primary key (e.g. `A320`)
    pub icao_code: String,
    /// Marketing name
    pub name: Option<String>,
    /// Free-text description (e.g. `L2J`)
    pub description: Option<String>,
    /// Wake turbulence category
    pub wtc: Option<Wtc>,
}
