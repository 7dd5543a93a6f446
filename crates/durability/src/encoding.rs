//! WAL frame encoding and decoding
//!
//! ## Frame Format
//!
//! ```text
//! [length: u32 LE][type: u8][payload: bytes][crc32: u32 LE]
//! ```
//!
//! - **length**: size of type + payload + crc (NOT including length itself)
//! - **type**: entry type tag, checked against the decoded variant
//! - **payload**: bincode-serialized WalEntry
//! - **crc32**: CRC32 over \[type\]\[payload\]

use crate::wal::WalEntry;
use crc32fast::Hasher;
use skytrace_core::{Error, Result};

const TYPE_TRACE_APPEND: u8 = 1;
const TYPE_REGISTRATION_UPSERT: u8 = 2;
const TYPE_MODEL_UPSERT: u8 = 3;
const TYPE_TAG_ADD: u8 = 4;
const TYPE_TAG_REMOVE: u8 = 5;
const TYPE_METADATA_SET: u8 = 6;

/// Bytes of framing around a payload: type(1) + crc(4)
const MIN_FRAME_BODY: usize = 5;

/// Largest frame body accepted on either side of the codec
///
/// A length prefix above this can only come from damage, never from a
/// write that was cut short.
pub const MAX_FRAME_BODY: usize = 64 * 1024 * 1024;

fn type_tag(entry: &WalEntry) -> u8 {
    match entry {
        WalEntry::TraceAppend { .. } => TYPE_TRACE_APPEND,
        WalEntry::RegistrationUpsert { .. } => TYPE_REGISTRATION_UPSERT,
        WalEntry::ModelUpsert { .. } => TYPE_MODEL_UPSERT,
        WalEntry::TagAdd { .. } => TYPE_TAG_ADD,
        WalEntry::TagRemove { .. } => TYPE_TAG_REMOVE,
        WalEntry::MetadataSet { .. } => TYPE_METADATA_SET,
    }
}

fn checksum(tag: u8, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[tag]);
    hasher.update(payload);
    hasher.finalize()
}

/// Result of decoding at one offset
#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// A complete, verified entry and the bytes it occupied
    Entry(WalEntry, usize),
    /// The buffer ends before the frame does
    Incomplete,
}

/// Encode one entry as a framed byte buffer
pub fn encode_entry(entry: &WalEntry) -> Result<Vec<u8>> {
    let tag = type_tag(entry);
    let payload = bincode::serialize(entry)?;
    let body_len = MIN_FRAME_BODY + payload.len();
    if body_len > MAX_FRAME_BODY {
        return Err(Error::Serialization(format!(
            "WAL entry too large: {} bytes (max {})",
            body_len, MAX_FRAME_BODY
        )));
    }

    let mut buf = Vec::with_capacity(4 + body_len);
    buf.extend_from_slice(&(body_len as u32).to_le_bytes());
    buf.push(tag);
    buf.extend_from_slice(&payload);
    buf.extend_from_slice(&checksum(tag, &payload).to_le_bytes());
    Ok(buf)
}

/// Declared total frame size (length prefix included), if the prefix is present
pub fn frame_len(buf: &[u8]) -> Option<usize> {
    let prefix: [u8; 4] = buf.get(..4)?.try_into().ok()?;
    Some(4 + u32::from_le_bytes(prefix) as usize)
}

/// Decode the frame at the start of `buf`
///
/// `offset` is the file position of `buf[0]`, used in error messages.
///
/// # Errors
///
/// `Error::Corruption` when the length is below the framing size or above
/// [`MAX_FRAME_BODY`], the CRC does not
/// match, the payload does not deserialize, or the type tag disagrees with
/// the payload.
pub fn decode_entry(buf: &[u8], offset: u64) -> Result<Decoded> {
    let Some(total) = frame_len(buf) else {
        return Ok(Decoded::Incomplete);
    };
    if total - 4 < MIN_FRAME_BODY {
        return Err(Error::Corruption(format!(
            "offset {}: invalid frame length {}",
            offset,
            total - 4
        )));
    }
    if total - 4 > MAX_FRAME_BODY {
        return Err(Error::Corruption(format!(
            "offset {}: frame length {} exceeds maximum {}",
            offset,
            total - 4,
            MAX_FRAME_BODY
        )));
    }
    if buf.len() < total {
        return Ok(Decoded::Incomplete);
    }

    let tag = buf[4];
    let payload = &buf[5..total - 4];
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&buf[total - 4..total]);
    let expected = u32::from_le_bytes(crc_bytes);
    let actual = checksum(tag, payload);
    if actual != expected {
        return Err(Error::Corruption(format!(
            "offset {}: CRC mismatch: expected {:08x}, got {:08x}",
            offset, expected, actual
        )));
    }

    let entry: WalEntry = bincode::deserialize(payload).map_err(|e| {
        Error::Corruption(format!("offset {}: undecodable payload: {}", offset, e))
    })?;
    if type_tag(&entry) != tag {
        return Err(Error::Corruption(format!(
            "offset {}: type tag {} does not match payload",
            offset, tag
        )));
    }
    Ok(Decoded::Entry(entry, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skytrace_core::{IcaoAddress, TraceRecord};

    fn sample() -> WalEntry {
        WalEntry::TraceAppend {
            record: TraceRecord::new(
                Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                IcaoAddress::new(0xabc123).unwrap(),
            ),
        }
    }

    #[test]
    fn test_frame_layout() {
        let bytes = encode_entry(&sample()).unwrap();
        assert_eq!(frame_len(&bytes), Some(bytes.len()));
        assert_eq!(bytes[4], TYPE_TRACE_APPEND);
    }

    #[test]
    fn test_decode_reports_consumed_bytes() {
        let mut bytes = encode_entry(&sample()).unwrap();
        let len = bytes.len();
        bytes.extend_from_slice(&[0xAA; 3]);
        match decode_entry(&bytes, 0).unwrap() {
            Decoded::Entry(entry, consumed) => {
                assert_eq!(entry, sample());
                assert_eq!(consumed, len);
            }
            Decoded::Incomplete => panic!("expected a complete entry"),
        }
    }

    #[test]
    fn test_truncated_frame_is_incomplete() {
        let bytes = encode_entry(&sample()).unwrap();
        assert_eq!(decode_entry(&bytes[..2], 0).unwrap(), Decoded::Incomplete);
        assert_eq!(
            decode_entry(&bytes[..bytes.len() - 1], 0).unwrap(),
            Decoded::Incomplete
        );
    }

    #[test]
    fn test_bit_flip_is_corruption() {
        let mut bytes = encode_entry(&sample()).unwrap();
        bytes[8] ^= 0xFF;
        let err = decode_entry(&bytes, 128).unwrap_err();
        assert!(matches!(err, Error::Corruption(ref msg) if msg.contains("offset 128")));
    }

    #[test]
    fn test_tiny_length_is_corruption() {
        let bytes = [2u8, 0, 0, 0, 1, 0];
        assert!(matches!(decode_entry(&bytes, 0), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_oversized_length_is_corruption_not_incomplete() {
        let mut bytes = encode_entry(&sample()).unwrap();
        bytes[3] = 0x7f;
        let err = decode_entry(&bytes, 0).unwrap_err();
        assert!(matches!(err, Error::Corruption(ref msg) if msg.contains("exceeds maximum")));
    }

    #[test]
    fn test_type_tag_mismatch_is_corruption() {
        let mut bytes = encode_entry(&sample()).unwrap();
        bytes[4] = TYPE_METADATA_SET;
        let total = bytes.len();
        let crc = checksum(TYPE_METADATA_SET, &bytes[5..total - 4]);
        bytes[total - 4..].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(decode_entry(&bytes, 0), Err(Error::Corruption(_))));
    }
}
