//! Identity ↔ tag relation, indexed in both directions
//!
//! Mutations take the forward entry first and update the reverse map while
//! still holding it, so the two maps never disagree once a call returns.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHasher;
use skytrace_core::{Error, IcaoAddress, Result};
use std::collections::BTreeSet;
use std::hash::BuildHasherDefault;
use tracing::debug;

type FxBuild = BuildHasherDefault<FxHasher>;

/// Forward (identity → tags) and reverse (tag → identities) maps
#[derive(Debug, Default)]
pub struct TagTables {
    forward: DashMap<IcaoAddress, BTreeSet<String>, FxBuild>,
    reverse: DashMap<String, BTreeSet<IcaoAddress>, FxBuild>,
}

impl TagTables {
    /// Empty relation
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `(icao, tag)`; `DuplicateTag` if the pair already exists
    pub fn add_with<F>(&self, icao: IcaoAddress, tag: &str, log: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let _tags = match self.forward.entry(icao) {
            Entry::Occupied(mut tags) => {
                if tags.get().contains(tag) {
                    return Err(Error::DuplicateTag {
                        icao_address: icao,
                        tag: tag.to_string(),
                    });
                }
                log()?;
                tags.get_mut().insert(tag.to_string());
                tags.into_ref()
            }
            Entry::Vacant(vacant) => {
                log()?;
                vacant.insert(BTreeSet::from([tag.to_string()]))
            }
        };
        // Forward entry stays locked until the reverse side is updated
        self.reverse.entry(tag.to_string()).or_default().insert(icao);
        debug!(icao = %icao, tag, "tag added");
        Ok(())
    }

    /// Remove `(icao, tag)`; returns whether the pair existed
    ///
    /// `log` only runs when there is something to remove.
    pub fn remove_with<F>(&self, icao: IcaoAddress, tag: &str, log: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        let Entry::Occupied(mut tags) = self.forward.entry(icao) else {
            return Ok(false);
        };
        if !tags.get().contains(tag) {
            return Ok(false);
        }
        log()?;
        tags.get_mut().remove(tag);
        if let Some(mut holders) = self.reverse.get_mut(tag) {
            holders.remove(&icao);
        }
        self.reverse.remove_if(tag, |_, holders| holders.is_empty());
        if tags.get().is_empty() {
            tags.remove();
        }
        debug!(icao = %icao, tag, "tag removed");
        Ok(true)
    }

    /// Tags carried by `icao`
    pub fn tags_for(&self, icao: IcaoAddress) -> BTreeSet<String> {
        self.forward
            .get(&icao)
            .map(|tags| tags.value().clone())
            .unwrap_or_default()
    }

    /// Identities carrying `tag`
    pub fn identities_with(&self, tag: &str) -> BTreeSet<IcaoAddress> {
        let candidates: Vec<IcaoAddress> = match self.reverse.get(tag) {
            Some(holders) => holders.iter().copied().collect(),
            None => return BTreeSet::new(),
        };
        candidates
            .into_iter()
            .filter(|icao| self.contains(*icao, tag))
            .collect()
    }

    /// Whether the pair exists
    pub fn contains(&self, icao: IcaoAddress, tag: &str) -> bool {
        self.forward
            .get(&icao)
            .is_some_and(|tags| tags.contains(tag))
    }

    /// Number of distinct tags in use
    pub fn tag_count(&self) -> usize {
        self.reverse.len()
    }
}
