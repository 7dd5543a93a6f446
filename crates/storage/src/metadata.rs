//! Process-wide key → JSON document table

use dashmap::DashMap;
use serde_json::Value;
use skytrace_core::Result;
use tracing::debug;

/// Last-writer-wins metadata map
#[derive(Debug, Default)]
pub struct MetadataTable {
    entries: DashMap<String, Value>,
}

impl MetadataTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value for `key`
    pub fn set_with<F>(&self, key: &str, value: Value, log: F) -> Result<()>
    where
        F: FnOnce(&str, &Value) -> Result<()>,
    {
        let entry = self.entries.entry(key.to_string());
        log(key, &value)?;
        entry.insert(value);
        debug!(key, "metadata set");
        Ok(())
    }

    /// Current value for `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no key is set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
