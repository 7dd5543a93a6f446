//! Concurrency layer for skytrace
//!
//! This crate provides the two mechanisms that let trace appends run
//! concurrently without exposing half-indexed records:
//! - CommitTracker: record id allocation and the visibility watermark
//! - Segment locks: bounded-wait `RwLock` acquisition with retryable timeouts

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod locks;
pub mod watermark;

pub use locks::{read_segment, write_segment, SegmentWriteGuard};
pub use watermark::{CommitTracker, Reservation};
