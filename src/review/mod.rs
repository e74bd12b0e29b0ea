// src/review/mod.rs
//! Review queue: generated articles waiting for an operator decision.
//!
//! States: `pending` → `approved` | `skipped`; both targets are terminal.
//!
//! Write-through: every mutation runs on a copy of the document, the copy is
//! persisted, and only then does it replace the in-memory state. A failed
//! write returns `StoreError` and leaves both memory and disk as they were.
//! One mutex covers all of this, so operator commands and the timeout sweep
//! are serialised and no lock is ever held across an `.await`.
//!
//! Ids come from a persisted counter and are never handed out twice.

pub mod types;

use chrono::Duration;
use metrics::gauge;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::clock::SharedClock;
use crate::generate::GeneratedArticle;
use crate::ingest::types::CandidateItem;
use crate::store::{Persist, StoreError};

pub use types::{ArticleStatus, PendingArticle};

/// Persisted form of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDoc {
    /// Last id sequence handed out.
    #[serde(default)]
    pub last_seq: u64,
    #[serde(default)]
    pub articles: BTreeMap<String, PendingArticle>,
}

fn format_id(seq: u64) -> String {
    format!("{seq:04}")
}

pub struct ReviewQueue {
    state: Mutex<QueueDoc>,
    store: Box<dyn Persist<QueueDoc>>,
    clock: SharedClock,
}

impl ReviewQueue {
    /// Rehydrate from the store. An unreadable document is an error: starting
    /// empty would overwrite it on the next write and lose decisions.
    pub fn open(
        store: impl Persist<QueueDoc> + 'static,
        clock: SharedClock,
    ) -> Result<Self, StoreError> {
        let doc = store.load()?.unwrap_or_default();
        info!(
            target: "review",
            articles = doc.articles.len(),
            last_seq = doc.last_seq,
            "review queue loaded"
        );
        let q = Self {
            state: Mutex::new(doc),
            store: Box::new(store),
            clock,
        };
        q.publish_gauge(&q.lock());
        Ok(q)
    }

    fn lock(&self) -> MutexGuard<'_, QueueDoc> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn publish_gauge(&self, doc: &QueueDoc) {
        let pending = doc.articles.values().filter(|a| a.is_pending()).count();
        gauge!("review_pending").set(pending as f64);
    }

    /// Apply `f` to a copy, persist it if it changed, then commit.
    fn mutate<R>(&self, f: impl FnOnce(&mut QueueDoc) -> R) -> Result<R, StoreError> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let out = f(&mut next);
        if next != *guard {
            self.store.save(&next)?;
            *guard = next;
            self.publish_gauge(&guard);
        }
        Ok(out)
    }

    /// New pending article; durable before the id is returned.
    pub fn enqueue(
        &self,
        candidate: CandidateItem,
        generated: GeneratedArticle,
    ) -> Result<String, StoreError> {
        let now = self.clock.now();
        let id = self.mutate(|doc| {
            doc.last_seq += 1;
            let mut id = format_id(doc.last_seq);
            // a hand-edited document could already hold this id
            while doc.articles.contains_key(&id) {
                doc.last_seq += 1;
                id = format_id(doc.last_seq);
            }
            doc.articles.insert(
                id.clone(),
                PendingArticle::new(id.clone(), now, candidate, generated),
            );
            id
        })?;
        info!(target: "review", %id, "article enqueued for review");
        Ok(id)
    }

    /// pending → approved. Unknown or non-pending ids are left out of the result.
    pub fn approve<I, S>(&self, ids: I) -> Result<Vec<String>, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let approved = self.mutate(|doc| approve_in(doc, ids))?;
        if !approved.is_empty() {
            info!(target: "review", ids = ?approved, "articles approved");
        }
        Ok(approved)
    }

    /// Pending ids older than `timeout`. Does not mutate.
    pub fn expire_due(&self, timeout: Duration) -> Vec<String> {
        let now = self.clock.now();
        expired_in(&self.lock(), timeout, now)
    }

    /// `expire_due` + `approve` under one lock.
    pub fn auto_approve_expired(&self, timeout: Duration) -> Result<Vec<String>, StoreError> {
        let now = self.clock.now();
        let approved = self.mutate(|doc| {
            let due = expired_in(doc, timeout, now);
            approve_in(doc, due)
        })?;
        if !approved.is_empty() {
            info!(target: "review", ids = ?approved, "auto-approved expired articles");
        }
        Ok(approved)
    }

    pub fn skip_all_pending(&self) -> Result<Vec<String>, StoreError> {
        let skipped = self.mutate(|doc| {
            let mut out = Vec::new();
            for (id, a) in doc.articles.iter_mut() {
                if a.is_pending() {
                    a.status = ArticleStatus::Skipped;
                    out.push(id.clone());
                }
            }
            out
        })?;
        if !skipped.is_empty() {
            info!(target: "review", ids = ?skipped, "pending articles skipped");
        }
        Ok(skipped)
    }

    /// Delete regardless of state. `Ok(false)` if the id was not there.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|doc| doc.articles.remove(id).is_some())
    }

    /// Retention sweep over every state.
    pub fn purge_older_than(&self, age: Duration) -> Result<usize, StoreError> {
        self.purge_where(age, |_| true)
    }

    /// Retention sweep that keeps approved articles: they are still owed a
    /// draft, and dropping them would lose an operator decision.
    pub fn purge_settled_older_than(&self, age: Duration) -> Result<usize, StoreError> {
        self.purge_where(age, |a| a.status != ArticleStatus::Approved)
    }

    fn purge_where(
        &self,
        age: Duration,
        eligible: impl Fn(&PendingArticle) -> bool,
    ) -> Result<usize, StoreError> {
        let cutoff = self.clock.now() - age;
        let removed = self.mutate(|doc| {
            let before = doc.articles.len();
            doc.articles.retain(|_, a| a.created_at >= cutoff || !eligible(a));
            before - doc.articles.len()
        })?;
        if removed > 0 {
            info!(target: "review", removed, "cleared old articles");
        }
        Ok(removed)
    }

    /// Approved ids created before `now - age`, oldest first.
    pub fn approved_older_than(&self, age: Duration) -> Vec<String> {
        let cutoff = self.clock.now() - age;
        self.list_approved()
            .into_iter()
            .filter(|a| a.created_at < cutoff)
            .map(|a| a.id)
            .collect()
    }

    /// Pending plus approved: articles that will still turn into drafts.
    pub fn awaiting_publish(&self) -> usize {
        self.lock()
            .articles
            .values()
            .filter(|a| a.status != ArticleStatus::Skipped)
            .count()
    }

    /// Pending articles, oldest first.
    pub fn list_pending(&self) -> Vec<PendingArticle> {
        self.list_where(PendingArticle::is_pending)
    }

    /// Approved and still queued (i.e. not yet published), oldest first.
    pub fn list_approved(&self) -> Vec<PendingArticle> {
        self.list_where(|a| a.status == ArticleStatus::Approved)
    }

    fn list_where(&self, keep: impl Fn(&PendingArticle) -> bool) -> Vec<PendingArticle> {
        let mut v: Vec<PendingArticle> = self
            .lock()
            .articles
            .values()
            .filter(|a| keep(a))
            .cloned()
            .collect();
        v.sort_by(queue_order);
        v
    }

    /// Fingerprints of everything still queued, whatever its state.
    pub fn queued_fingerprints(&self) -> HashSet<String> {
        self.lock()
            .articles
            .values()
            .map(|a| a.source_item.fingerprint.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<PendingArticle> {
        self.lock().articles.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn approve_in<I, S>(doc: &mut QueueDoc, ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for id in ids {
        if let Some(a) = doc.articles.get_mut(id.as_ref()) {
            if a.is_pending() {
                a.status = ArticleStatus::Approved;
                out.push(a.id.clone());
            }
        }
    }
    out
}

fn expired_in(doc: &QueueDoc, timeout: Duration, now: chrono::DateTime<chrono::Utc>) -> Vec<String> {
    let mut due: Vec<&PendingArticle> = doc
        .articles
        .values()
        .filter(|a| a.is_pending() && now.signed_duration_since(a.created_at) > timeout)
        .collect();
    due.sort_by(|a, b| queue_order(a, b));
    due.into_iter().map(|a| a.id.clone()).collect()
}

/// Creation time, then id sequence. Ids are zero-padded to four digits, so a
/// longer id is always a later one.
fn queue_order(a: &PendingArticle, b: &PendingArticle) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.len().cmp(&b.id.len()))
        .then_with(|| a.id.cmp(&b.id))
}
