//! Ingestion boundary: raw observations to validated, compacted records
//!
//! ## Validation
//!
//! `Observation` carries feed values as received. Converting it into a
//! `TraceRecord` is where malformed input is rejected with `InvalidRecord`:
//! identities wider than 24 bits, squawk text that is not four octal
//! digits, non-printable source tags. Blank callsign text becomes an absent
//! callsign.
//!
//! ## Compaction
//!
//! A receiver reports an aircraft every second or so, almost always with the
//! same callsign and squawk. `TrackCompactor` keeps only the points that
//! matter for the callsign/squawk indexes:
//!
//! ```text
//! obs:   t0 UAL1 1200 | t1 - - | t2 UAL1 1200 | t3 UAL1 7700 | t4 - -
//! kept:  t0 UAL1 1200 |        |              | t3 UAL1 7700 | t4 UAL1 7700
//!        (first)                               (squawk change)  (last)
//! ```
//!
//! Fields an observation omits are carried forward from earlier ones.

use serde::{Deserialize, Serialize};
use skytrace_core::{
    Callsign, DataSource, Error, IcaoAddress, Result, Squawk, Timestamp, TraceRecord,
};

/// One state update as delivered by a feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Observation time
    pub time: Timestamp,
    /// Raw identity
    pub icao_address: u32,
    /// Callsign text, possibly padded or blank
    #[serde(default)]
    pub callsign: Option<String>,
    /// Squawk as four octal digits
    #[serde(default)]
    pub squawk: Option<String>,
    /// Feed/receiver tag
    #[serde(default)]
    pub data_source: Option<char>,
}

impl Observation {
    /// Observation with only the required fields
    pub fn new(time: Timestamp, icao_address: u32) -> Self {
        Self {
            time,
            icao_address,
            callsign: None,
            squawk: None,
            data_source: None,
        }
    }

    /// Set the callsign text
    pub fn with_callsign(mut self, callsign: impl Into<String>) -> Self {
        self.callsign = Some(callsign.into());
        self
    }

    /// Set the squawk text
    pub fn with_squawk(mut self, squawk: impl Into<String>) -> Self {
        self.squawk = Some(squawk.into());
        self
    }

    /// Set the source tag
    pub fn with_data_source(mut self, data_source: char) -> Self {
        self.data_source = Some(data_source);
        self
    }
}

impl TryFrom<Observation> for TraceRecord {
    type Error = Error;

    fn try_from(obs: Observation) -> Result<Self> {
        let icao_address = IcaoAddress::new(obs.icao_address)?;
        let squawk = obs.squawk.as_deref().map(str::parse::<Squawk>).transpose()?;
        let data_source = obs.data_source.map(DataSource::new).transpose()?;
        Ok(TraceRecord::new(obs.time, icao_address)
            .with_callsign(obs.callsign.as_deref().and_then(Callsign::new))
            .with_squawk(squawk)
            .with_data_source(data_source))
    }
}

/// Drops observations that add nothing to the callsign/squawk history
///
/// Feed one aircraft's records in time order through [`push`], then call
/// [`finish`] to flush the final point.
///
/// [`push`]: TrackCompactor::push
/// [`finish`]: TrackCompactor::finish
#[derive(Debug, Default)]
pub struct TrackCompactor {
    callsign: Option<Callsign>,
    squawk: Option<Squawk>,
    started: bool,
    held: Option<TraceRecord>,
}

impl TrackCompactor {
    /// Fresh compactor
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next record; returns it if it must be kept
    ///
    /// The returned record carries the callsign and squawk in effect at
    /// that point, including values carried forward.
    pub fn push(&mut self, record: TraceRecord) -> Option<TraceRecord> {
        let mut changed = false;
        if let Some(callsign) = record.callsign {
            changed |= self.callsign.as_ref() != Some(&callsign);
            self.callsign = Some(callsign);
        }
        if let Some(squawk) = record.squawk {
            changed |= self.squawk != Some(squawk);
            self.squawk = Some(squawk);
        }

        let current = TraceRecord {
            callsign: self.callsign.clone(),
            squawk: self.squawk,
            ..record
        };

        if !self.started || changed {
            self.started = true;
            self.held = None;
            Some(current)
        } else {
            self.held = Some(current);
            None
        }
    }

    /// Flush the last record if it was not already kept
    pub fn finish(self) -> Option<TraceRecord> {
        self.held
    }
}

/// Compact one aircraft's time-ordered records
pub fn compact_track(records: impl IntoIterator<Item = TraceRecord>) -> Vec<TraceRecord> {
    let mut compactor = TrackCompactor::new();
    let mut kept: Vec<TraceRecord> = records
        .into_iter()
        .filter_map(|record| compactor.push(record))
        .collect();
    kept.extend(compactor.finish());
    kept
}

/// Validate a track: every observation converts and all share one identity
///
/// Returns the records sorted by time (stable for equal times).
pub fn validate_track(observations: impl IntoIterator<Item = Observation>) -> Result<Vec<TraceRecord>> {
    let mut records = observations
        .into_iter()
        .map(TraceRecord::try_from)
        .collect::<Result<Vec<_>>>()?;

    if let Some(first) = records.first() {
        let icao = first.icao_address;
        if let Some(other) = records.iter().find(|r| r.icao_address != icao) {
            return Err(Error::InvalidRecord(format!(
                "track mixes identities {} and {}",
                icao, other.icao_address
            )));
        }
    }

    records.sort_by_key(|r| r.time);
    Ok(records)
}
