//! Multi-key flight search
//!
//! A search names a time range and any number of identities, callsigns and
//! squawks. A record matches when it falls in the range AND carries any of
//! the listed keys. With no keys listed the search is a plain time query.
//!
//! All index scans of one search share a single watermark, so the union is
//! taken over one consistent snapshot.

use crate::trace::{TraceStore, Traces};
use serde::{Deserialize, Serialize};
use skytrace_core::{CancellationToken, Callsign, IcaoAddress, Result, Squawk, TimeRange};
use skytrace_storage::AccessPath;
use tracing::debug;

/// Search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Time window
    #[serde(default = "TimeRange::all")]
    pub range: TimeRange,
    /// Identities to match
    #[serde(default)]
    pub icao_addresses: Vec<IcaoAddress>,
    /// Callsigns to match
    #[serde(default)]
    pub callsigns: Vec<Callsign>,
    /// Squawks to match
    #[serde(default)]
    pub squawks: Vec<Squawk>,
}

impl SearchQuery {
    /// Search over `range` with no keys yet
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            icao_addresses: Vec::new(),
            callsigns: Vec::new(),
            squawks: Vec::new(),
        }
    }

    /// Also match `icao_address`
    pub fn identity(mut self, icao_address: IcaoAddress) -> Self {
        self.icao_addresses.push(icao_address);
        self
    }

    /// Also match `callsign`
    pub fn callsign(mut self, callsign: Callsign) -> Self {
        self.callsigns.push(callsign);
        self
    }

    /// Also match `squawk`
    pub fn squawk(mut self, squawk: Squawk) -> Self {
        self.squawks.push(squawk);
        self
    }

    /// Whether any key is listed
    pub fn has_keys(&self) -> bool {
        !(self.icao_addresses.is_empty() && self.callsigns.is_empty() && self.squawks.is_empty())
    }

    fn paths(&self) -> Vec<AccessPath> {
        if !self.has_keys() {
            return vec![AccessPath::Time];
        }
        self.icao_addresses
            .iter()
            .copied()
            .map(AccessPath::Identity)
            .chain(self.callsigns.iter().cloned().map(AccessPath::Callsign))
            .chain(self.squawks.iter().copied().map(AccessPath::Squawk))
            .collect()
    }
}

impl TraceStore {
    /// Records in the search range matching any listed key
    ///
    /// Deduplicated and ordered by `(time, RecordId)`.
    pub fn search(&self, query: &SearchQuery, cancel: &CancellationToken) -> Result<Traces> {
        cancel.check()?;
        let tables = self.database().traces();
        let mut ctx = tables.begin_scan(cancel);
        let mut keys = Vec::new();
        let paths = query.paths();
        for path in &paths {
            tables.scan_into(&mut ctx, path, &query.range, &mut keys)?;
        }
        keys.sort_unstable();
        keys.dedup();
        debug!(paths = paths.len(), scanned = ctx.scanned(), matched = keys.len(), "trace search");
        Ok(tables.resolve(&keys))
    }
}
