//! Global database registry for singleton management
//!
//! Ensures only one Database instance exists per filesystem path, so two
//! handles in one process never append to the same WAL independently.
//! Weak references let a database close once every handle is dropped.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Weak;

use super::Database;

/// Global registry of open databases (path -> weak reference)
pub static OPEN_DATABASES: Lazy<Mutex<HashMap<PathBuf, Weak<Database>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
