//! Durability layer for skytrace
//!
//! This crate handles everything that touches disk:
//!
//! - WAL: append-only log with one entry per mutation
//! - Frame encoding: length-prefixed, CRC32-checked bincode payloads
//! - Durability modes: Strict, Batched (default)
//! - Torn-tail detection for crash recovery

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod wal;

pub use encoding::{decode_entry, encode_entry, Decoded};
pub use wal::{DurabilityMode, Wal, WalEntry, WalReplay};
