//! Properties of the `Skytrace` handle as a whole

use super::{icao, ts};
use proptest::prelude::*;
use proptest::sample::select;
use skytrace::{
    CancellationToken, Callsign, SearchQuery, Skytrace, Squawk, TimeRange, TraceRecord,
};
use tempfile::TempDir;

fn arb_record() -> impl Strategy<Value = TraceRecord> {
    (
        0i64..300,
        1u32..5,
        proptest::option::of(select(vec!["UAL100", "DLH4"])),
        proptest::option::of(select(vec![0o1200u16, 0o7700])),
    )
        .prop_map(|(secs, who, callsign, squawk)| {
            TraceRecord::new(ts(secs), icao(who))
                .with_callsign(callsign.and_then(Callsign::new))
                .with_squawk(squawk.map(Squawk::new))
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn enrich_keeps_order_and_attaches_tags(
        records in prop::collection::vec(arb_record(), 0..30),
        tagged in 1u32..5,
    ) {
        let db = Skytrace::ephemeral();
        db.tags().add_tag(icao(tagged), "watch").unwrap();
        for record in &records {
            db.traces().append(record.clone()).unwrap();
        }

        let found = db.traces().query_by_time(TimeRange::all()).unwrap();
        let rows = db.enrich(&found);
        prop_assert_eq!(rows.len(), found.len());
        for (row, record) in rows.iter().zip(&found) {
            prop_assert_eq!(&row.record, &**record);
            prop_assert_eq!(row.tags.contains("watch"), record.icao_address == icao(tagged));
            prop_assert!(row.aircraft.is_none());
        }
    }

    #[test]
    fn single_identity_search_matches_identity_query(
        records in prop::collection::vec(arb_record(), 0..30),
        who in 1u32..5,
        start in 0i64..300,
        len in 0i64..300,
    ) {
        let db = Skytrace::ephemeral();
        for record in &records {
            db.traces().append(record.clone()).unwrap();
        }
        let range = TimeRange::new(ts(start), ts(start + len));

        let searched = db
            .traces()
            .search(&SearchQuery::new(range).identity(icao(who)), &CancellationToken::new())
            .unwrap();
        let direct = db.traces().query_by_identity_and_time(icao(who), range).unwrap();
        prop_assert_eq!(searched, direct);
    }

    #[test]
    fn reopen_reproduces_every_query(records in prop::collection::vec(arb_record(), 1..20)) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("adsb");
        let before = {
            let db = Skytrace::open(&path).unwrap();
            for record in &records {
                db.traces().append(record.clone()).unwrap();
            }
            let found = db.traces().query_by_time(TimeRange::all()).unwrap();
            db.shutdown().unwrap();
            found
        };

        let db = Skytrace::open(&path).unwrap();
        let after = db.traces().query_by_time(TimeRange::all()).unwrap();
        prop_assert_eq!(after, before);
        prop_assert_eq!(
            db.traces().query_by_squawk(Squawk::EMERGENCY).unwrap().len(),
            records.iter().filter(|r| r.squawk == Some(Squawk::EMERGENCY)).count()
        );
    }
}
