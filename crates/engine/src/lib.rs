//! Database engine for skytrace
//!
//! This crate orchestrates all lower layers:
//! - Database: owns the tables and the WAL, with open/ephemeral/shutdown
//! - Configuration via `skytrace.toml`
//! - Recovery: WAL replay on open, torn-tail repair
//! - The write path: every mutation is logged before it is applied
//!
//! The engine is the only component that knows about:
//! - Cross-layer coordination (storage + WAL + recovery)
//! - Replay logic

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;

pub use database::{
    Database, RecoveryStats, SkytraceConfig, CONFIG_FILE_NAME, WAL_DIR_NAME, WAL_FILE_NAME,
};
