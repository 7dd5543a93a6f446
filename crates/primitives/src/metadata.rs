//! MetadataStore: shared key/value documents
//!
//! Values are JSON documents. Writes are last-writer-wins with no version
//! check. Typed accessors convert through `serde_json::Value`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use skytrace_core::{Error, Result};
use skytrace_engine::Database;
use std::sync::Arc;

/// Key holding the stored data layout version
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Metadata facade
#[derive(Clone)]
pub struct MetadataStore {
    db: Arc<Database>,
}

impl MetadataStore {
    /// Create new MetadataStore instance
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get the underlying database reference
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Raw value for `key`
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.db.metadata().get(key)
    }

    /// Replace the raw value for `key`
    pub fn set_value(&self, key: &str, value: Value) -> Result<()> {
        self.db.set_metadata(key, value)
    }

    /// Value for `key` decoded as `T`
    ///
    /// `Ok(None)` if the key is absent; `Serialization` if the stored
    /// document does not decode as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_value(key)
            .map(|value| serde_json::from_value(value).map_err(Error::from))
            .transpose()
    }

    /// Like [`get`](Self::get), but a missing key is `NotFound`
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)?
            .ok_or_else(|| Error::NotFound(format!("metadata key '{}'", key)))
    }

    /// Store `value` under `key`
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_value(key, serde_json::to_value(value)?)
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.db.metadata().keys()
    }

    /// Stored data layout version, if recorded
    pub fn schema_version(&self) -> Result<Option<u32>> {
        self.get(SCHEMA_VERSION_KEY)
    }
}
