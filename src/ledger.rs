// src/ledger.rs
//! Deduplication ledger: which fingerprints already became a draft.
//!
//! The persisted document is re-read on every query so several processes
//! (the server and the one-shot binary) observe each other's records.
//! Read failures are logged and answered as "not seen"; `record` never
//! overwrites a document it could not read.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::ingest::types::CandidateItem;
use crate::store::{Persist, StoreError};

/// How long a ledger entry keeps blocking its fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenPolicy {
    /// Any entry, however old, counts as seen.
    Forever,
    /// Only entries recorded within the window count.
    Window(Duration),
}

impl SeenPolicy {
    /// `None` or `0` means forever.
    pub fn from_hours(hours: Option<u64>) -> Self {
        match hours {
            Some(h) if h > 0 => SeenPolicy::Window(Duration::hours(h as i64)),
            _ => SeenPolicy::Forever,
        }
    }

    fn blocks(&self, entry: &LedgerEntry, now: DateTime<Utc>) -> bool {
        match self {
            SeenPolicy::Forever => true,
            SeenPolicy::Window(w) => now.signed_duration_since(entry.recorded_at) < *w,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub fingerprint: String,
    pub title: String,
    pub published_url: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerDoc {
    #[serde(default)]
    pub entries: BTreeMap<String, LedgerEntry>,
}

pub struct Ledger {
    store: Box<dyn Persist<LedgerDoc>>,
    policy: SeenPolicy,
    clock: SharedClock,
    // serialises read-modify-write in `record`
    write: Mutex<()>,
}

impl Ledger {
    pub fn open(store: impl Persist<LedgerDoc> + 'static, policy: SeenPolicy, clock: SharedClock) -> Self {
        Self {
            store: Box::new(store),
            policy,
            clock,
            write: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> SeenPolicy {
        self.policy
    }

    fn read_doc(&self) -> Option<LedgerDoc> {
        match self.store.load() {
            Ok(doc) => Some(doc.unwrap_or_default()),
            Err(e) => {
                warn!(target: "ledger", error = %e, "ledger read failed; treating items as unseen");
                None
            }
        }
    }

    pub fn is_seen(&self, fingerprint: &str) -> bool {
        let Some(doc) = self.read_doc() else {
            return false;
        };
        let now = self.clock.now();
        doc.entries
            .get(fingerprint)
            .is_some_and(|e| self.policy.blocks(e, now))
    }

    /// Drops items whose fingerprint is seen. One document read for the batch.
    pub fn filter_unseen(&self, items: Vec<CandidateItem>) -> Vec<CandidateItem> {
        let Some(doc) = self.read_doc() else {
            return items;
        };
        let now = self.clock.now();
        items
            .into_iter()
            .filter(|it| {
                let seen = doc
                    .entries
                    .get(&it.fingerprint)
                    .is_some_and(|e| self.policy.blocks(e, now));
                if seen {
                    debug!(target: "ledger", fingerprint = %it.fingerprint, "already seen");
                }
                !seen
            })
            .collect()
    }

    /// Idempotent insert. `Ok(false)` if the fingerprint was already present.
    pub fn record(
        &self,
        fingerprint: &str,
        title: &str,
        published_url: &str,
    ) -> Result<bool, StoreError> {
        let _guard = self.write.lock().unwrap_or_else(|p| p.into_inner());
        let mut doc = self.store.load()?.unwrap_or_default();
        if doc.entries.contains_key(fingerprint) {
            debug!(target: "ledger", %fingerprint, "record is a no-op; already present");
            return Ok(false);
        }
        doc.entries.insert(
            fingerprint.to_string(),
            LedgerEntry {
                fingerprint: fingerprint.to_string(),
                title: title.to_string(),
                published_url: published_url.to_string(),
                recorded_at: self.clock.now(),
            },
        );
        self.store.save(&doc)?;
        Ok(true)
    }

    pub fn entry(&self, fingerprint: &str) -> Option<LedgerEntry> {
        self.read_doc()?.entries.get(fingerprint).cloned()
    }

    /// Entries recorded at or after `since`; 0 when the ledger is unreadable.
    pub fn recorded_since(&self, since: DateTime<Utc>) -> usize {
        self.read_doc()
            .map(|d| d.entries.values().filter(|e| e.recorded_at >= since).count())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.read_doc().map(|d| d.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
