//! Error types for skytrace
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Classification
//!
//! - Storage failures (`StorageFailure`, `Io`, `Corruption`) are surfaced to the
//!   caller untouched. The core never retries them; the retry policy belongs to
//!   whoever owns the persistence medium.
//! - `Timeout` is the only retryable kind: a contended index segment could not
//!   be acquired within the configured bound and nothing was written.
//! - `NotFound` is reserved for APIs that require a value. Plain lookups
//!   return `Option` instead.

use crate::types::IcaoAddress;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for skytrace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for skytrace
#[derive(Debug, Error)]
pub enum Error {
    /// Persistence layer unavailable or rejected the write
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A required value does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The (identity, tag) pair already exists
    #[error("Tag '{tag}' already present on {icao_address}")]
    DuplicateTag {
        /// Identity carrying the tag
        icao_address: IcaoAddress,
        /// The duplicated tag
        tag: String,
    },

    /// Malformed record rejected at the ingestion boundary
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A contended index segment could not be acquired in time
    #[error("Timed out after {waited:?} waiting for {resource}")]
    Timeout {
        /// Which structure was contended
        resource: String,
        /// How long the caller waited
        waited: Duration,
    },

    /// A scan was abandoned through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration value rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Whether the error originates in the persistence medium
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Error::StorageFailure(_) | Error::Io(_) | Error::Corruption(_)
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
