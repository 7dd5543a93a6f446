//! Append-only record arena
//!
//! Holds each TraceRecord exactly once, addressed by its RecordId. Indexes
//! store only `(time, RecordId)` keys and resolve payloads here.

use dashmap::DashMap;
use rustc_hash::FxHasher;
use skytrace_core::{RecordId, TraceRecord};
use std::hash::BuildHasherDefault;
use std::sync::Arc;

/// RecordId → immutable record
#[derive(Debug, Default)]
pub struct RecordArena {
    records: DashMap<RecordId, Arc<TraceRecord>, BuildHasherDefault<FxHasher>>,
}

impl RecordArena {
    /// Empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record under its id
    ///
    /// Ids come from the commit tracker and are never reused, so this
    /// never replaces an existing record.
    pub fn insert(&self, id: RecordId, record: TraceRecord) {
        let previous = self.records.insert(id, Arc::new(record));
        debug_assert!(previous.is_none(), "record id {} reused", id);
    }

    /// Look up a record
    pub fn get(&self, id: RecordId) -> Option<Arc<TraceRecord>> {
        self.records.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the arena is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skytrace_core::IcaoAddress;

    #[test]
    fn test_insert_and_get() {
        let arena = RecordArena::new();
        let record = TraceRecord::new(
            Utc.timestamp_opt(100, 0).unwrap(),
            IcaoAddress::new(0x4840d6).unwrap(),
        );
        arena.insert(RecordId::new(0), record.clone());

        assert_eq!(arena.get(RecordId::new(0)).as_deref(), Some(&record));
        assert!(arena.get(RecordId::new(1)).is_none());
        assert_eq!(arena.len(), 1);
    }
}
