//! Reference tables: registrations (with a reverse index on tail number)
//! and aircraft models
//!
//! Updates serialize per primary key through the map's entry guard; the
//! `log` hook runs under that guard so the WAL order for a key matches the
//! order its updates become visible.
//!
//! Lock order is always registrations → by_registration. Readers of the
//! reverse index copy the candidate set out before consulting the forward
//! table, and drop candidates whose current registration no longer matches.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHasher;
use skytrace_core::{AircraftModel, AircraftRegistration, IcaoAddress, Result};
use std::collections::BTreeSet;
use std::hash::BuildHasherDefault;
use tracing::debug;

type FxBuild = BuildHasherDefault<FxHasher>;

/// In-memory registration and model tables
#[derive(Debug, Default)]
pub struct CatalogTables {
    registrations: DashMap<IcaoAddress, AircraftRegistration, FxBuild>,
    by_registration: DashMap<String, BTreeSet<IcaoAddress>, FxBuild>,
    models: DashMap<String, AircraftModel, FxBuild>,
}

impl CatalogTables {
    /// Empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the row for `row.icao_address`
    pub fn upsert_registration_with<F>(&self, row: AircraftRegistration, log: F) -> Result<()>
    where
        F: FnOnce(&AircraftRegistration) -> Result<()>,
    {
        let icao = row.icao_address;
        match self.registrations.entry(icao) {
            Entry::Occupied(mut occupied) => {
                log(&row)?;
                let previous = occupied.get().registration.clone();
                if previous != row.registration {
                    self.unlink(&previous, icao);
                    self.link(&row.registration, icao);
                }
                debug!(icao = %icao, registration = %row.registration, "registration updated");
                occupied.insert(row);
            }
            Entry::Vacant(vacant) => {
                log(&row)?;
                self.link(&row.registration, icao);
                debug!(icao = %icao, registration = %row.registration, "registration created");
                vacant.insert(row);
            }
        }
        Ok(())
    }

    fn link(&self, registration: &str, icao: IcaoAddress) {
        self.by_registration
            .entry(registration.to_string())
            .or_default()
            .insert(icao);
    }

    fn unlink(&self, registration: &str, icao: IcaoAddress) {
        if let Some(mut set) = self.by_registration.get_mut(registration) {
            set.remove(&icao);
        }
        self.by_registration.remove_if(registration, |_, set| set.is_empty());
    }

    /// Current row for `icao`
    pub fn registration(&self, icao: IcaoAddress) -> Option<AircraftRegistration> {
        self.registrations.get(&icao).map(|r| r.value().clone())
    }

    /// Identities whose current registration is exactly `registration`
    pub fn find_by_registration(&self, registration: &str) -> Vec<IcaoAddress> {
        let candidates: Vec<IcaoAddress> = match self.by_registration.get(registration) {
            Some(set) => set.iter().copied().collect(),
            None => return Vec::new(),
        };
        candidates
            .into_iter()
            .filter(|icao| {
                self.registrations
                    .get(icao)
                    .is_some_and(|row| row.registration == registration)
            })
            .collect()
    }

    /// Insert or overwrite the row for `model.icao_code`
    pub fn upsert_model_with<F>(&self, model: AircraftModel, log: F) -> Result<()>
    where
        F: FnOnce(&AircraftModel) -> Result<()>,
    {
        match self.models.entry(model.icao_code.clone()) {
            Entry::Occupied(mut occupied) => {
                log(&model)?;
                debug!(icao_code = %model.icao_code, "model updated");
                occupied.insert(model);
            }
            Entry::Vacant(vacant) => {
                log(&model)?;
                debug!(icao_code = %model.icao_code, "model created");
                vacant.insert(model);
            }
        }
        Ok(())
    }

    /// Current row for `icao_code`
    pub fn model(&self, icao_code: &str) -> Option<AircraftModel> {
        self.models.get(icao_code).map(|m| m.value().clone())
    }

    /// Number of registration rows
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Number of model rows
    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skytrace_core::{Error, Wtc};

    fn reg(icao: u32, registration: &str) -> AircraftRegistration {
        AircraftRegistration {
            icao_address: IcaoAddress::new(icao).unwrap(),
            registration: registration.to_string(),
            model: Some("A320".to_string()),
        }
    }

    fn no_log<T>(_: &T) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_upsert_overwrites_and_moves_reverse_entry() {
        let tables = CatalogTables::new();
        tables.upsert_registration_with(reg(1, "N100"), no_log).unwrap();
        tables.upsert_registration_with(reg(1, "N200"), no_log).unwrap();

        let icao = IcaoAddress::new(1).unwrap();
        assert_eq!(tables.registration(icao).unwrap().registration, "N200");
        assert!(tables.find_by_registration("N100").is_empty());
        assert_eq!(tables.find_by_registration("N200"), vec![icao]);
        assert_eq!(tables.registration_count(), 1);
    }

    #[test]
    fn test_reverse_lookup_returns_every_holder() {
        let tables = CatalogTables::new();
        tables.upsert_registration_with(reg(1, "D-AIZZ"), no_log).unwrap();
        tables.upsert_registration_with(reg(2, "D-AIZZ"), no_log).unwrap();
        assert_eq!(tables.find_by_registration("D-AIZZ").len(), 2);
        assert!(tables.find_by_registration("unknown").is_empty());
    }

    #[test]
    fn test_failed_log_keeps_previous_row() {
        let tables = CatalogTables::new();
        tables.upsert_registration_with(reg(1, "N100"), no_log).unwrap();
        let err = tables
            .upsert_registration_with(reg(1, "N999"), |_| {
                Err(Error::StorageFailure("wal closed".into()))
            })
            .unwrap_err();
        assert!(err.is_storage_failure());

        let icao = IcaoAddress::new(1).unwrap();
        assert_eq!(tables.registration(icao).unwrap().registration, "N100");
        assert_eq!(tables.find_by_registration("N100"), vec![icao]);
        assert!(tables.find_by_registration("N999").is_empty());
    }

    #[test]
    fn test_model_upsert_and_get() {
        let tables = CatalogTables::new();
        let model = AircraftModel {
            icao_code: "B744".to_string(),
            name: Some("Boeing 747-400".to_string()),
            description: Some("L4J".to_string()),
            wtc: Some(Wtc::Heavy),
        };
        tables.upsert_model_with(model.clone(), no_log).unwrap();
        assert_eq!(tables.model("B744"), Some(model));
        assert!(tables.model("A388").is_none());
    }
}
