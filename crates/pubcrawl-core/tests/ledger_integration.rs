//! Integration tests for the ledger backends.
//!
//! Each backend is driven through the `Ledger` trait the same way a session
//! drives it: load, commit changesets, reload from a fresh handle.

use chrono::{TimeZone, Utc};
use pubcrawl_core::ledger::codec::{decode_participants, PARTICIPANT_COLUMNS};
use pubcrawl_core::storage::StoreConfig;
use pubcrawl_core::{
    Achievement, BlobLedger, BlobStore, Changeset, FsBlobStore, Ledger, Participant,
    PunishmentRecord, SqliteLedger,
};

fn participant(name: &str, stops: &[&str], points: u64) -> Participant {
    let start = Utc.with_ymd_and_hms(2024, 12, 14, 18, 0, 0).unwrap();
    let mut p = Participant::new(name, start).unwrap();
    p.completed_stops = stops.iter().map(|s| s.to_string()).collect();
    p.current_stop = stops.len();
    p.points = points;
    if !stops.is_empty() {
        p.achievements.insert(Achievement::FirstTimer);
    }
    p
}

fn punishment(name: &str, stop: &str, text: &str) -> PunishmentRecord {
    PunishmentRecord {
        time: Utc.with_ymd_and_hms(2024, 12, 14, 19, 30, 0).unwrap(),
        name: name.to_string(),
        stop: stop.to_string(),
        punishment: text.to_string(),
    }
}

fn exercise(ledger: &dyn Ledger, reopen: &dyn Fn() -> Box<dyn Ledger>) {
    let empty = ledger.load();
    assert!(empty.participants.is_empty());
    assert!(empty.punishments.is_empty());
    assert!(empty.warnings.is_empty());

    ledger
        .commit(&Changeset {
            participants: vec![participant("Mark", &["Lavery's"], 200)],
            punishments: vec![],
        })
        .unwrap();
    ledger
        .commit(&Changeset {
            participants: vec![participant("Aoife", &["Lavery's", "The Points"], 400)],
            punishments: vec![punishment("Aoife", "The Points", "Do an Irish dance")],
        })
        .unwrap();

    let snapshot = reopen().load();
    assert_eq!(snapshot.participants.len(), 2);
    assert_eq!(snapshot.participants.rows()[0].name, "Mark");
    assert_eq!(
        snapshot.participants.get("Aoife"),
        Some(&participant("Aoife", &["Lavery's", "The Points"], 400))
    );
    assert_eq!(snapshot.punishments.count_for("Aoife"), 1);

    ledger.reset().unwrap();
    let cleared = reopen().load();
    assert!(cleared.participants.is_empty());
    assert!(cleared.punishments.is_empty());
}

#[test]
fn test_file_ledger_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let open = move || -> Box<dyn Ledger> {
        Box::new(BlobLedger::new(
            FsBlobStore::open(&root).unwrap(),
            &StoreConfig::default(),
        ))
    };
    let ledger = open();
    exercise(ledger.as_ref(), &open);
}

#[test]
fn test_sqlite_ledger_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pubcrawl.db");
    let open = move || -> Box<dyn Ledger> { Box::new(SqliteLedger::open(&path).unwrap()) };
    let ledger = open();
    exercise(ledger.as_ref(), &open);
}

#[test]
fn test_file_ledger_writes_readable_tables() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::open(dir.path()).unwrap();
    let ledger = BlobLedger::new(store, &StoreConfig::default());
    ledger
        .commit(&Changeset {
            participants: vec![participant("Mark", &["Lavery's"], 200)],
            punishments: vec![],
        })
        .unwrap();

    let text = std::fs::read_to_string(dir.path().join("participants.csv")).unwrap();
    let header = text.lines().next().unwrap();
    assert_eq!(header, PARTICIPANT_COLUMNS.join(","));

    let decoded = decode_participants(&text).unwrap();
    assert_eq!(decoded.table.get("Mark").unwrap().points, 200);
}

#[test]
fn test_two_handles_on_one_directory_do_not_clobber() {
    let dir = tempfile::tempdir().unwrap();
    let a = BlobLedger::new(FsBlobStore::open(dir.path()).unwrap(), &StoreConfig::default());
    let b = BlobLedger::new(FsBlobStore::open(dir.path()).unwrap(), &StoreConfig::default());

    // Both read the empty state first, then write different rows.
    let _ = a.load();
    let _ = b.load();
    a.commit(&Changeset {
        participants: vec![participant("Mark", &["Lavery's"], 200)],
        punishments: vec![],
    })
    .unwrap();
    b.commit(&Changeset {
        participants: vec![participant("Aoife", &[], 0)],
        punishments: vec![],
    })
    .unwrap();

    let names: Vec<String> = a.load().participants.iter().map(|p| p.name.clone()).collect();
    assert_eq!(names, vec!["Mark".to_string(), "Aoife".to_string()]);
}

#[test]
fn test_garbage_blob_loads_empty_with_warning_and_save_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::open(dir.path()).unwrap();
    store
        .create("participants.csv", "seed", "Name,Points\n\"Mark,12\n")
        .unwrap();

    let ledger = BlobLedger::new(store, &StoreConfig::default());
    let mut snapshot = ledger.load();
    assert!(snapshot.participants.is_empty());
    assert!(!snapshot.warnings.is_empty());

    assert!(ledger.save(&mut snapshot).is_err());
    let raw = std::fs::read_to_string(dir.path().join("participants.csv")).unwrap();
    assert!(raw.contains("Mark,12"));
}
