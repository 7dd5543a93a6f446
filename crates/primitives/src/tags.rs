//! TagIndex: free-form labels on aircraft identities
//!
//! Each (identity, tag) pair exists at most once. Adding an existing pair
//! fails with `DuplicateTag`; removing a missing pair is a no-op.

use skytrace_core::{IcaoAddress, Result};
use skytrace_engine::Database;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Tag facade
#[derive(Clone)]
pub struct TagIndex {
    db: Arc<Database>,
}

impl TagIndex {
    /// Create new TagIndex instance
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get the underlying database reference
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Attach `tag` to `icao_address`
    ///
    /// # Errors
    ///
    /// `DuplicateTag` if the pair already exists; the existing pair is left
    /// as it was.
    pub fn add_tag(&self, icao_address: IcaoAddress, tag: &str) -> Result<()> {
        self.db.add_tag(icao_address, tag)
    }

    /// Detach `tag`; returns whether the pair existed
    pub fn remove_tag(&self, icao_address: IcaoAddress, tag: &str) -> Result<bool> {
        self.db.remove_tag(icao_address, tag)
    }

    /// Tags on `icao_address`
    pub fn tags_for(&self, icao_address: IcaoAddress) -> BTreeSet<String> {
        self.db.tags().tags_for(icao_address)
    }

    /// Identities carrying `tag`
    pub fn identities_with_tag(&self, tag: &str) -> BTreeSet<IcaoAddress> {
        self.db.tags().identities_with(tag)
    }

    /// Whether the pair exists
    pub fn has_tag(&self, icao_address: IcaoAddress, tag: &str) -> bool {
        self.db.tags().contains(icao_address, tag)
    }
}
