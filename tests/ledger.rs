// tests/ledger.rs
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

use matchday_desk::clock::ManualClock;
use matchday_desk::ingest::types::CandidateItem;
use matchday_desk::ledger::{Ledger, LedgerDoc, SeenPolicy};
use matchday_desk::store::JsonFile;

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 8, 16, 12, 0, 0).unwrap(),
    ))
}

#[test]
fn records_are_durable_and_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let clock = clock();

    let ledger = Ledger::open(JsonFile::<LedgerDoc>::new(&path), SeenPolicy::Forever, clock.clone());
    assert!(ledger.record("abc", "First", "https://blog/1").unwrap());
    assert!(!ledger.record("abc", "Second", "https://blog/2").unwrap());

    let reopened = Ledger::open(JsonFile::<LedgerDoc>::new(&path), SeenPolicy::Forever, clock);
    assert!(reopened.is_seen("abc"));
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.entry("abc").unwrap().title, "First");
}

#[test]
fn two_handles_see_each_others_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let clock = clock();
    let a = Ledger::open(JsonFile::<LedgerDoc>::new(&path), SeenPolicy::Forever, clock.clone());
    let b = Ledger::open(JsonFile::<LedgerDoc>::new(&path), SeenPolicy::Forever, clock);

    a.record("fp-1", "One", "u1").unwrap();
    assert!(b.is_seen("fp-1"));
}

#[test]
fn filter_unseen_respects_window() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let ledger = Ledger::open(
        JsonFile::<LedgerDoc>::new(dir.path().join("ledger.json")),
        SeenPolicy::from_hours(Some(48)),
        clock.clone(),
    );
    let old = CandidateItem::new("Old", "", "https://n/old", "Fixture");
    let new = CandidateItem::new("New", "", "https://n/new", "Fixture");
    ledger.record(&old.fingerprint, "Old", "u").unwrap();

    let kept = ledger.filter_unseen(vec![old.clone(), new.clone()]);
    assert_eq!(kept, vec![new.clone()]);

    clock.advance(Duration::hours(49));
    assert_eq!(ledger.filter_unseen(vec![old.clone(), new.clone()]).len(), 2);
}

#[test]
fn corrupt_ledger_reads_as_unseen_and_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(&path, "[[[").unwrap();

    let ledger = Ledger::open(JsonFile::<LedgerDoc>::new(&path), SeenPolicy::Forever, clock());
    assert!(!ledger.is_seen("anything"));
    assert_eq!(ledger.recorded_since(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()), 0);
    assert!(ledger.record("fp", "T", "u").is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[[[");
}

#[test]
fn recorded_since_counts_today_only() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let ledger = Ledger::open(
        JsonFile::<LedgerDoc>::new(dir.path().join("ledger.json")),
        SeenPolicy::Forever,
        clock.clone(),
    );
    ledger.record("yesterday", "Y", "u").unwrap();
    clock.advance(Duration::hours(13));
    ledger.record("today-1", "A", "u").unwrap();
    ledger.record("today-2", "B", "u").unwrap();

    let midnight = Utc.with_ymd_and_hms(2025, 8, 17, 0, 0, 0).unwrap();
    assert_eq!(ledger.recorded_since(midnight), 2);
    assert_eq!(ledger.len(), 3);
}
