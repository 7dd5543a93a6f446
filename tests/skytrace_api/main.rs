//! End-to-end tests through the public `Skytrace` handle
//!
//! ```bash
//! cargo test --test skytrace_api
//! ```

use chrono::{TimeZone, Utc};
use serde_json::json;
use skytrace::{
    CancellationToken, Callsign, Error, IcaoAddress, Observation, SearchQuery, Skytrace,
    SkytraceConfig, Squawk, TimeRange, Timestamp, TraceRecord, Wtc, SCHEMA_VERSION_KEY,
};
use std::collections::BTreeSet;
use tempfile::TempDir;

mod properties;

fn ts(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn icao(v: u32) -> IcaoAddress {
    IcaoAddress::new(v).unwrap()
}

fn seed(db: &Skytrace) {
    let a = icao(0xabc123);
    db.catalog()
        .upsert_model(
            "B772",
            Some("Boeing 777-200".into()),
            Some("L2J".into()),
            Some(Wtc::Heavy),
        )
        .unwrap();
    db.catalog()
        .upsert_registration(a, "N774UA", Some("B772".into()))
        .unwrap();
    db.tags().add_tag(a, "widebody").unwrap();
    db.metadata().set(SCHEMA_VERSION_KEY, &3).unwrap();
    db.traces()
        .ingest_track(vec![
            Observation::new(ts(0), 0xabc123)
                .with_callsign("UAL100")
                .with_squawk("1200")
                .with_data_source('A'),
            Observation::new(ts(5), 0xabc123),
            Observation::new(ts(10), 0xabc123).with_squawk("7700"),
            Observation::new(ts(15), 0xabc123),
        ])
        .unwrap();
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_everything_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("adsb");

    {
        let db = Skytrace::open(&path).unwrap();
        seed(&db);
        db.shutdown().unwrap();
    }

    let db = Skytrace::open(&path).unwrap();
    assert!(db.recovery_stats().entries() > 0);

    let history = db.traces().query_by_identity(icao(0xabc123)).unwrap();
    let times: Vec<_> = history.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![ts(0), ts(10), ts(15)]);

    let emergencies = db.traces().query_by_squawk(Squawk::EMERGENCY).unwrap();
    assert_eq!(emergencies.len(), 2);

    let info = db.catalog().describe(icao(0xabc123)).unwrap();
    assert_eq!(info.registration.registration, "N774UA");
    assert_eq!(info.model.unwrap().wtc, Some(Wtc::Heavy));
    assert_eq!(
        db.tags().tags_for(icao(0xabc123)),
        BTreeSet::from(["widebody".to_string()])
    );
    assert_eq!(db.metadata().schema_version().unwrap(), Some(3));
}

#[test]
fn test_config_file_is_written_and_read() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("configured");

    {
        let cfg = SkytraceConfig {
            durability: "always".to_string(),
            lock_timeout_ms: 1_000,
            ..SkytraceConfig::default()
        };
        let db = Skytrace::open_with_config(&path, cfg).unwrap();
        db.shutdown().unwrap();
    }

    assert!(path.join("skytrace.toml").exists());
    let db = Skytrace::open(&path).unwrap();
    assert_eq!(db.database().config().durability, "always");
    assert_eq!(db.database().config().lock_timeout_ms, 1_000);
}

#[test]
fn test_writes_rejected_after_shutdown_reads_continue() {
    let db = Skytrace::ephemeral();
    db.traces().append(TraceRecord::new(ts(0), icao(1))).unwrap();
    db.shutdown().unwrap();

    let err = db
        .traces()
        .append(TraceRecord::new(ts(1), icao(1)))
        .unwrap_err();
    assert!(err.is_storage_failure());
    assert!(matches!(
        db.tags().add_tag(icao(1), "late"),
        Err(Error::StorageFailure(_))
    ));
    assert_eq!(db.traces().len(), 1);
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_search_and_enrich() {
    let db = Skytrace::ephemeral();
    seed(&db);
    db.traces()
        .append(
            TraceRecord::new(ts(7), icao(0x3c6444)).with_callsign(Callsign::new("DLH4")),
        )
        .unwrap();

    let query = SearchQuery::new(TimeRange::new(ts(0), ts(12)))
        .callsign(Callsign::new("DLH4").unwrap())
        .squawk(Squawk::EMERGENCY);
    let found = db.traces().search(&query, &CancellationToken::new()).unwrap();
    let rows = db.enrich(&found);

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].record.icao_address, icao(0x3c6444));
    assert_eq!(rows[0].registration(), None);
    assert_eq!(rows[1].registration(), Some("N774UA"));
    assert!(rows[1].tags.contains("widebody"));
}

#[test]
fn test_sightings_answer_when_squawk_was_used() {
    let db = Skytrace::ephemeral();
    seed(&db);

    let sightings = db
        .traces()
        .sightings_by_squawk(Squawk::EMERGENCY, &CancellationToken::new())
        .unwrap();
    assert_eq!(sightings.len(), 1);
    assert_eq!(sightings[0].first_seen, ts(10));
    assert_eq!(sightings[0].last_seen, ts(15));
}

#[test]
fn test_metadata_raw_documents() {
    let db = Skytrace::ephemeral();
    db.metadata()
        .set_value("import", json!({"source": "faa", "rows": 10}))
        .unwrap();
    assert_eq!(
        db.metadata().get_value("import"),
        Some(json!({"source": "faa", "rows": 10}))
    );
    assert!(db.metadata().get_value("missing").is_none());
}
