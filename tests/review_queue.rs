// tests/review_queue.rs
//
// Review queue state machine against real JSON files.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

use matchday_desk::clock::{ManualClock, SharedClock};
use matchday_desk::generate::GeneratedArticle;
use matchday_desk::ingest::types::CandidateItem;
use matchday_desk::review::{ArticleStatus, QueueDoc, ReviewQueue};
use matchday_desk::store::{JsonFile, StoreError};

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 8, 16, 12, 0, 0).unwrap(),
    ))
}

fn candidate(n: u32) -> (CandidateItem, GeneratedArticle) {
    (
        CandidateItem::new(
            format!("Story {n}"),
            "Summary",
            format!("https://news.example/{n}"),
            "Fixture",
        )
        .with_image(format!("https://img.example/{n}.jpg"), None),
        GeneratedArticle {
            title: format!("Generated {n}"),
            content: "<p>Body</p>".into(),
            teaser: "Teaser".into(),
            type_tag: "analysis".into(),
        },
    )
}

fn open(path: &std::path::Path, clock: SharedClock) -> ReviewQueue {
    ReviewQueue::open(JsonFile::<QueueDoc>::new(path), clock).unwrap()
}

#[test]
fn enqueued_article_survives_reload_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("review_queue.json");
    let clock = clock();

    let q = open(&path, clock.clone());
    let (c, g) = candidate(1);
    let id = q.enqueue(c, g).unwrap();
    let before = q.get(&id).unwrap();
    drop(q);

    let reopened = open(&path, clock);
    assert_eq!(reopened.get(&id).unwrap(), before);
    assert_eq!(reopened.list_pending().len(), 1);
}

#[test]
fn ids_keep_increasing_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("review_queue.json");
    let clock = clock();

    let q = open(&path, clock.clone());
    let (c, g) = candidate(1);
    let first = q.enqueue(c, g).unwrap();
    q.remove(&first).unwrap();
    drop(q);

    let q = open(&path, clock);
    let (c, g) = candidate(2);
    let second = q.enqueue(c, g).unwrap();
    assert_ne!(first, second);
    assert!(second > first);
}

#[test]
fn timeout_approves_once_then_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let q = open(&dir.path().join("q.json"), clock.clone());
    let (c, g) = candidate(1);
    let id = q.enqueue(c, g).unwrap();

    clock.advance(Duration::minutes(30));
    assert!(q.expire_due(Duration::minutes(30)).is_empty(), "exactly at timeout is not expired");

    clock.advance(Duration::minutes(1));
    assert_eq!(q.expire_due(Duration::minutes(30)), vec![id.clone()]);
    assert_eq!(q.auto_approve_expired(Duration::minutes(30)).unwrap(), vec![id.clone()]);
    assert_eq!(q.get(&id).unwrap().status, ArticleStatus::Approved);

    clock.advance(Duration::minutes(29));
    assert!(q.auto_approve_expired(Duration::minutes(30)).unwrap().is_empty());
}

#[test]
fn approve_excludes_already_approved_ids() {
    let dir = tempfile::tempdir().unwrap();
    let q = open(&dir.path().join("q.json"), clock());
    let (c, g) = candidate(1);
    let x = q.enqueue(c, g).unwrap();
    let (c, g) = candidate(2);
    let y = q.enqueue(c, g).unwrap();

    assert_eq!(q.approve([x.as_str()]).unwrap(), vec![x.clone()]);
    assert_eq!(q.approve([x.as_str(), y.as_str()]).unwrap(), vec![y.clone()]);
    assert!(q.approve([x.as_str(), y.as_str(), "nope"]).unwrap().is_empty());
    assert!(q.list_pending().is_empty());
    assert_eq!(q.list_approved().len(), 2);
}

#[test]
fn concurrent_approvals_approve_each_id_once() {
    let dir = tempfile::tempdir().unwrap();
    let q = Arc::new(open(&dir.path().join("q.json"), clock()));
    let mut ids = Vec::new();
    for n in 0..8 {
        let (c, g) = candidate(n);
        ids.push(q.enqueue(c, g).unwrap());
    }

    let mut all: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let q = q.clone();
                let ids = ids.clone();
                s.spawn(move || q.approve(&ids).unwrap())
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });
    all.sort();
    assert_eq!(all, ids);
}

#[test]
fn corrupt_queue_file_refuses_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("q.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = ReviewQueue::open(JsonFile::<QueueDoc>::new(&path), clock());
    assert!(matches!(err, Err(StoreError::Corrupt { .. })));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn persisted_document_uses_lowercase_states() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("q.json");
    let q = open(&path, clock());
    let (c, g) = candidate(1);
    let id = q.enqueue(c, g).unwrap();
    q.approve([id.as_str()]).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["articles"][id.as_str()]["status"], "approved");
    assert_eq!(raw["last_seq"], 1);
}
