//! WAL replay into freshly created tables
//!
//! Entries are applied in file order with a no-op log hook, so replay
//! never writes back to the WAL it is reading.

use skytrace_core::{Error, Result};
use skytrace_durability::WalEntry;
use skytrace_storage::{CatalogTables, MetadataTable, TagTables, TraceTables};
use tracing::warn;

/// Counters reported after replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Trace records re-appended
    pub traces: u64,
    /// Registration upserts applied
    pub registrations: u64,
    /// Model upserts applied
    pub models: u64,
    /// Tag additions applied
    pub tags_added: u64,
    /// Tag removals applied
    pub tags_removed: u64,
    /// Metadata sets applied
    pub metadata: u64,
    /// Bytes of torn tail discarded
    pub torn_bytes: u64,
}

impl RecoveryStats {
    /// Total entries applied
    pub fn entries(&self) -> u64 {
        self.traces
            + self.registrations
            + self.models
            + self.tags_added
            + self.tags_removed
            + self.metadata
    }
}

pub(crate) struct Tables<'a> {
    pub traces: &'a TraceTables,
    pub catalog: &'a CatalogTables,
    pub tags: &'a TagTables,
    pub metadata: &'a MetadataTable,
}

pub(crate) fn replay(
    tables: Tables<'_>,
    entries: Vec<WalEntry>,
    stats: &mut RecoveryStats,
) -> Result<()> {
    for entry in entries {
        match entry {
            WalEntry::TraceAppend { record } => {
                tables.traces.append_with(record, |_| Ok(()))?;
                stats.traces += 1;
            }
            WalEntry::RegistrationUpsert { row } => {
                tables.catalog.upsert_registration_with(row, |_| Ok(()))?;
                stats.registrations += 1;
            }
            WalEntry::ModelUpsert { model } => {
                tables.catalog.upsert_model_with(model, |_| Ok(()))?;
                stats.models += 1;
            }
            WalEntry::TagAdd { icao_address, tag } => {
                match tables.tags.add_with(icao_address, &tag, || Ok(())) {
                    Ok(()) => stats.tags_added += 1,
                    Err(Error::DuplicateTag { .. }) => {
                        warn!(icao = %icao_address, tag, "duplicate tag in WAL skipped");
                    }
                    Err(e) => return Err(e),
                }
            }
            WalEntry::TagRemove { icao_address, tag } => {
                tables.tags.remove_with(icao_address, &tag, || Ok(()))?;
                stats.tags_removed += 1;
            }
            WalEntry::MetadataSet { key, json } => {
                let value = serde_json::from_str(&json).map_err(|e| {
                    Error::Corruption(format!("metadata '{}' holds invalid JSON: {}", key, e))
                })?;
                tables.metadata.set_with(&key, value, |_, _| Ok(()))?;
                stats.metadata += 1;
            }
        }
    }
    Ok(())
}
