//! Core identifier and value types
//!
//! This module defines the foundational types:
//! - IcaoAddress: 24-bit aircraft identity
//! - Squawk: transponder code, displayed in octal
//! - Callsign: trimmed, never-blank flight identifier
//! - DataSource: single-character feed/receiver tag
//! - Wtc: wake turbulence category
//! - RecordId: stable arena index of a stored trace record
//! - TimeRange: time interval with explicit bound kinds

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::str::FromStr;

/// Observation timestamp
pub type Timestamp = DateTime<Utc>;

/// Largest valid ICAO address (24 bits)
pub const MAX_ICAO_ADDRESS: u32 = 0x00FF_FFFF;

/// 24-bit aircraft identity
///
/// Displays and parses as six lowercase hex digits (`abc123`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct IcaoAddress(u32);

impl IcaoAddress {
    /// Create an address, rejecting values wider than 24 bits
    pub fn new(address: u32) -> Result<Self> {
        if address > MAX_ICAO_ADDRESS {
            return Err(Error::InvalidRecord(format!(
                "ICAO address {:#x} exceeds 24 bits",
                address
            )));
        }
        Ok(Self(address))
    }

    /// Raw numeric value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for IcaoAddress {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<IcaoAddress> for u32 {
    fn from(value: IcaoAddress) -> Self {
        value.0
    }
}

impl fmt::Display for IcaoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

impl fmt::Debug for IcaoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IcaoAddress({})", self)
    }
}

impl FromStr for IcaoAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let address = u32::from_str_radix(s.trim(), 16)
            .map_err(|_| Error::InvalidRecord(format!("invalid ICAO address: {:?}", s)))?;
        Self::new(address)
    }
}

/// Transponder code
///
/// Stored as the raw `u16` and displayed as four octal digits (`7700`).
/// Construction from a number is permissive; only text parsing enforces the
/// four-octal-digit shape.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Squawk(u16);

impl Squawk {
    /// ICAO VFR conspicuity code
    pub const VFR_STANDARD: Self = Self(0o7000);
    /// Unlawful interference
    pub const HIJACK: Self = Self(0o7500);
    /// Radio failure
    pub const RADIO_FAILURE: Self = Self(0o7600);
    /// General emergency
    pub const EMERGENCY: Self = Self(0o7700);

    /// Wrap a raw code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Raw numeric value
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl From<Squawk> for u16 {
    fn from(value: Squawk) -> Self {
        value.0
    }
}

impl fmt::Display for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

impl fmt::Debug for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Squawk({:04o})", self.0)
    }
}

impl FromStr for Squawk {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let err = || Error::InvalidRecord(format!("invalid squawk code: {:?}", s));
        if s.len() != 4 {
            return Err(err());
        }
        let code = u16::from_str_radix(s, 8).map_err(|_| err())?;
        Ok(Self(code))
    }
}

/// Flight identifier
///
/// Always trimmed and never blank. Unknown callsigns are `Option::None`
/// on the record, so a blank string can never be indexed or queried.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Callsign(String);

impl Callsign {
    /// Trim the input; blank input yields `None`
    pub fn new(s: impl AsRef<str>) -> Option<Self> {
        let trimmed = s.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The callsign text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Callsign {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Callsign::new(&value).ok_or_else(|| Error::InvalidRecord("blank callsign".to_string()))
    }
}

impl From<Callsign> for String {
    fn from(value: Callsign) -> Self {
        value.0
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callsign({})", self.0)
    }
}

/// Single-character tag naming the feed or receiver a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct DataSource(char);

impl DataSource {
    /// Accepts any visible ASCII character
    pub fn new(tag: char) -> Result<Self> {
        if tag.is_ascii_graphic() {
            Ok(Self(tag))
        } else {
            Err(Error::InvalidRecord(format!("invalid data source tag: {:?}", tag)))
        }
    }

    /// The tag character
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl TryFrom<char> for DataSource {
    type Error = Error;

    fn try_from(value: char) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DataSource> for char {
    fn from(value: DataSource) -> Self {
        value.0
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wake turbulence category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Wtc {
    /// L
    #[serde(rename = "L")]
    Light,
    /// M
    #[serde(rename = "M")]
    Medium,
    /// H
    #[serde(rename = "H")]
    Heavy,
    /// J
    #[serde(rename = "J")]
    Super,
}

impl Wtc {
    /// Single-letter code
    pub fn as_char(&self) -> char {
        match self {
            Wtc::Light => 'L',
            Wtc::Medium => 'M',
            Wtc::Heavy => 'H',
            Wtc::Super => 'J',
        }
    }

    /// Parse a single-letter code (case-insensitive)
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'L' => Some(Wtc::Light),
            'M' => Some(Wtc::Medium),
            'H' => Some(Wtc::Heavy),
            'J' => Some(Wtc::Super),
            _ => None,
        }
    }
}

impl fmt::Display for Wtc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Wtc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Wtc::from_char(c),
            _ => None,
        }
        .ok_or_else(|| Error::InvalidRecord(format!("invalid wake turbulence category: {:?}", s)))
    }
}

/// Stable index of a record in the trace arena
///
/// Assigned once at append time and never reused. Also breaks ties between
/// records with equal timestamps, so ordering within an index is
/// `(time, RecordId)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(u64);

impl RecordId {
    /// Smallest id, used as a lower sentinel in index range scans
    pub const MIN: RecordId = RecordId(0);
    /// Largest id, used as an upper sentinel in index range scans
    pub const MAX: RecordId = RecordId(u64::MAX);

    /// Wrap a raw id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Time interval with explicit bound kinds
///
/// ```ignore
/// TimeRange::new(t1, t2);       // [t1, t2)
/// TimeRange::inclusive(t1, t3); // [t1, t3]
/// TimeRange::all();             // unbounded
/// ```
///
/// Inverted or degenerate ranges are simply empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: Bound<Timestamp>,
    end: Bound<Timestamp>,
}

impl TimeRange {
    /// Half-open range `[start, end)`
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start: Bound::Included(start),
            end: Bound::Excluded(end),
        }
    }

    /// Closed range `[start, end]`
    pub fn inclusive(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start: Bound::Included(start),
            end: Bound::Included(end),
        }
    }

    /// Every timestamp
    pub fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// `[t, t + 1ms)`, or `[t, t]` at the end of the representable range
    pub fn at(t: Timestamp) -> Self {
        match t.checked_add_signed(chrono::Duration::milliseconds(1)) {
            Some(end) => Self::new(t, end),
            None => Self::inclusive(t, t),
        }
    }

    /// `[start, ∞)`
    pub fn since(start: Timestamp) -> Self {
        Self {
            start: Bound::Included(start),
            end: Bound::Unbounded,
        }
    }

    /// `(-∞, end)`
    pub fn until(end: Timestamp) -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Excluded(end),
        }
    }

    /// Build from arbitrary bounds
    pub fn from_bounds(start: Bound<Timestamp>, end: Bound<Timestamp>) -> Self {
        Self { start, end }
    }

    /// Lower bound
    pub fn start(&self) -> Bound<Timestamp> {
        self.start
    }

    /// Upper bound
    pub fn end(&self) -> Bound<Timestamp> {
        self.end
    }

    /// True when no timestamp can satisfy both bounds
    pub fn is_empty(&self) -> bool {
        let (s, s_incl) = match self.start {
            Bound::Included(s) => (s, true),
            Bound::Excluded(s) => (s, false),
            Bound::Unbounded => return false,
        };
        let (e, e_incl) = match self.end {
            Bound::Included(e) => (e, true),
            Bound::Excluded(e) => (e, false),
            Bound::Unbounded => return false,
        };
        s > e || (s == e && !(s_incl && e_incl))
    }

    /// Whether `t` falls inside the range
    pub fn contains(&self, t: &Timestamp) -> bool {
        RangeBounds::contains(self, t)
    }
}

impl RangeBounds<Timestamp> for TimeRange {
    fn start_bound(&self) -> Bound<&Timestamp> {
        self.start.as_ref()
    }

    fn end_bound(&self) -> Bound<&Timestamp> {
        self.end.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_icao_address_rejects_wide_values() {
        assert!(IcaoAddress::new(0x00FF_FFFF).is_ok());
        let err = IcaoAddress::new(0x0100_0000).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[test]
    fn test_icao_address_display_and_parse() {
        let icao = IcaoAddress::new(0xabc123).unwrap();
        assert_eq!(icao.to_string(), "abc123");
        assert_eq!("ABC123".parse::<IcaoAddress>().unwrap(), icao);
        assert_eq!(IcaoAddress::new(0x42).unwrap().to_string(), "000042");
        assert!("zzzzzz".parse::<IcaoAddress>().is_err());
        assert!("1000000".parse::<IcaoAddress>().is_err());
    }

    #[test]
    fn test_icao_address_deserialize_validates() {
        let ok: IcaoAddress = serde_json::from_str("11256099").unwrap();
        assert_eq!(ok.as_u32(), 11256099);
        let bad: std::result::Result<IcaoAddress, _> = serde_json::from_str("16777216");
        assert!(bad.is_err());
    }

    #[test]
    fn test_squawk_octal_display_and_parse() {
        assert_eq!(Squawk::EMERGENCY.to_string(), "7700");
        assert_eq!("7700".parse::<Squawk>().unwrap(), Squawk::EMERGENCY);
        assert_eq!("0042".parse::<Squawk>().unwrap().as_u16(), 0o42);
        assert!("7800".parse::<Squawk>().is_err());
        assert!("770".parse::<Squawk>().is_err());
    }

    #[test]
    fn test_squawk_numeric_construction_is_permissive() {
        let wide = Squawk::new(u16::MAX);
        assert_eq!(wide.as_u16(), u16::MAX);
    }

    #[test]
    fn test_callsign_blank_is_absent() {
        assert!(Callsign::new("").is_none());
        assert!(Callsign::new("   ").is_none());
        assert_eq!(Callsign::new(" UAL100 ").unwrap().as_str(), "UAL100");
        let bad: std::result::Result<Callsign, _> = serde_json::from_str("\"  \"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_data_source_requires_visible_ascii() {
        assert_eq!(DataSource::new('A').unwrap().as_char(), 'A');
        assert!(DataSource::new(' ').is_err());
        assert!(DataSource::new('é').is_err());
    }

    #[test]
    fn test_wtc_codes() {
        assert_eq!("M".parse::<Wtc>().unwrap(), Wtc::Medium);
        assert_eq!("j".parse::<Wtc>().unwrap(), Wtc::Super);
        assert!("".parse::<Wtc>().is_err());
        assert!("LM".parse::<Wtc>().is_err());
        assert_eq!(serde_json::to_string(&Wtc::Heavy).unwrap(), "\"H\"");
    }

    #[test]
    fn test_time_range_half_open() {
        let r = TimeRange::new(ts(10), ts(20));
        assert!(r.contains(&ts(10)));
        assert!(r.contains(&ts(19)));
        assert!(!r.contains(&ts(20)));
        assert!(!r.is_empty());
    }

    #[test]
    fn test_time_range_inclusive() {
        let r = TimeRange::inclusive(ts(10), ts(20));
        assert!(r.contains(&ts(20)));
        assert!(!TimeRange::inclusive(ts(10), ts(10)).is_empty());
    }

    #[test]
    fn test_time_range_empty_cases() {
        assert!(TimeRange::new(ts(10), ts(10)).is_empty());
        assert!(TimeRange::new(ts(20), ts(10)).is_empty());
        assert!(TimeRange::inclusive(ts(20), ts(10)).is_empty());
        assert!(!TimeRange::all().is_empty());
        assert!(!TimeRange::since(ts(5)).is_empty());
    }

    #[test]
    fn test_time_range_at_contains_instant() {
        let t = ts(1_700_000_000);
        let r = TimeRange::at(t);
        assert!(r.contains(&t));
        assert!(!r.contains(&(t + chrono::Duration::milliseconds(1))));
    }

    #[test]
    fn test_time_range_at_latest_instant() {
        let t = DateTime::<Utc>::MAX_UTC;
        let r = TimeRange::at(t);
        assert!(r.contains(&t));
        assert!(!r.is_empty());
    }

    #[test]
    fn test_time_range_serde_keeps_bounds() {
        for range in [
            TimeRange::new(ts(10), ts(20)),
            TimeRange::inclusive(ts(10), ts(20)),
            TimeRange::since(ts(10)),
            TimeRange::all(),
        ] {
            let json = serde_json::to_string(&range).unwrap();
            assert_eq!(serde_json::from_str::<TimeRange>(&json).unwrap(), range);
        }
    }

    #[test]
    fn test_record_id_sentinels() {
        assert!(RecordId::MIN < RecordId::new(1));
        assert!(RecordId::new(u64::MAX - 1) < RecordId::MAX);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn half_open_range_matches_comparison(a in 0i64..1000, b in 0i64..1000, t in 0i64..1000) {
                let range = TimeRange::new(ts(a), ts(b));
                prop_assert_eq!(range.contains(&ts(t)), a <= t && t < b);
                prop_assert_eq!(range.is_empty(), a >= b);
            }

            #[test]
            fn squawk_text_accepts_only_octal(code in 0u16..0o10000) {
                let text = format!("{:04o}", code);
                prop_assert_eq!(text.parse::<Squawk>().unwrap(), Squawk::new(code));
                let decimal = format!("{:04}", code % 10000);
                let has_non_octal = decimal.contains('8') || decimal.contains('9');
                prop_assert_eq!(decimal.parse::<Squawk>().is_err(), has_non_octal);
            }
        }
    }
}
