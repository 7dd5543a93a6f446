//! ReferenceCatalog: registration and model lookup tables
//!
//! Registrations are keyed by identity, models by ICAO model code. A
//! registration may name a model code that has no model row yet; the join in
//! [`ReferenceCatalog::describe`] simply leaves the model empty.
//!
//! Catalog reads never touch trace indexes, so they never wait on appends.

use serde::{Deserialize, Serialize};
use skytrace_core::{AircraftModel, AircraftRegistration, IcaoAddress, Result, Wtc};
use skytrace_engine::Database;
use std::sync::Arc;

/// Registration joined with its model row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftInfo {
    /// Registration row
    pub registration: AircraftRegistration,
    /// Model row, if the registration names a cataloged model
    pub model: Option<AircraftModel>,
}

/// Reference data facade
#[derive(Clone)]
pub struct ReferenceCatalog {
    db: Arc<Database>,
}

impl ReferenceCatalog {
    /// Create new ReferenceCatalog instance
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get the underlying database reference
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Insert or overwrite the registration for `icao_address`
    ///
    /// `model` is not checked against the model table.
    pub fn upsert_registration(
        &self,
        icao_address: IcaoAddress,
        registration: impl Into<String>,
        model: Option<String>,
    ) -> Result<()> {
        self.db.upsert_registration(AircraftRegistration {
            icao_address,
            registration: registration.into(),
            model,
        })
    }

    /// Current registration row
    pub fn get_registration(&self, icao_address: IcaoAddress) -> Option<AircraftRegistration> {
        self.db.catalog().registration(icao_address)
    }

    /// Identities currently registered under `registration`, ascending
    pub fn find_by_registration(&self, registration: &str) -> Vec<IcaoAddress> {
        self.db.catalog().find_by_registration(registration)
    }

    /// Insert or overwrite the model row for `icao_code`
    pub fn upsert_model(
        &self,
        icao_code: impl Into<String>,
        name: Option<String>,
        description: Option<String>,
        wtc: Option<Wtc>,
    ) -> Result<()> {
        self.db.upsert_model(AircraftModel {
            icao_code: icao_code.into(),
            name,
            description,
            wtc,
        })
    }

    /// Current model row
    pub fn get_model(&self, icao_code: &str) -> Option<AircraftModel> {
        self.db.catalog().model(icao_code)
    }

    /// Registration plus model for `icao_address`
    pub fn describe(&self, icao_address: IcaoAddress) -> Option<AircraftInfo> {
        let registration = self.get_registration(icao_address)?;
        let model = registration
            .model
            .as_deref()
            .and_then(|code| self.get_model(code));
        Some(AircraftInfo {
            registration,
            model,
        })
    }

    /// Number of registration rows
    pub fn registration_count(&self) -> usize {
        self.db.catalog().registration_count()
    }

    /// Number of model rows
    pub fn model_count(&self) -> usize {
        self.db.catalog().model_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::new(Database::ephemeral())
    }

    fn icao(v: u32) -> IcaoAddress {
        IcaoAddress::new(v).unwrap()
    }

    #[test]
    fn test_upsert_then_get() {
        let catalog = catalog();
        catalog
            .upsert_registration(icao(0xa1b2c3), "N12345", Some("B738".into()))
            .unwrap();
        let row = catalog.get_registration(icao(0xa1b2c3)).unwrap();
        assert_eq!(row.registration, "N12345");
        assert_eq!(row.model.as_deref(), Some("B738"));
        assert!(catalog.get_registration(icao(1)).is_none());
    }

    #[test]
    fn test_upsert_overwrites() {
        let catalog = catalog();
        catalog.upsert_registration(icao(1), "D-AIAB", None).unwrap();
        catalog
            .upsert_registration(icao(1), "D-AIAC", Some("A320".into()))
            .unwrap();

        assert_eq!(catalog.registration_count(), 1);
        assert!(catalog.find_by_registration("D-AIAB").is_empty());
        assert_eq!(catalog.find_by_registration("D-AIAC"), vec![icao(1)]);
    }

    #[test]
    fn test_describe_joins_model() {
        let catalog = catalog();
        catalog
            .upsert_model(
                "A320",
                Some("Airbus A320".into()),
                Some("L2J".into()),
                Some(Wtc::Medium),
            )
            .unwrap();
        catalog
            .upsert_registration(icao(2), "G-EUUA", Some("A320".into()))
            .unwrap();
        catalog
            .upsert_registration(icao(3), "N1", Some("ZZZZ".into()))
            .unwrap();

        let info = catalog.describe(icao(2)).unwrap();
        assert_eq!(info.model.unwrap().wtc, Some(Wtc::Medium));

        // Model code that is not cataloged
        let info = catalog.describe(icao(3)).unwrap();
        assert!(info.model.is_none());

        assert!(catalog.describe(icao(4)).is_none());
    }
}
