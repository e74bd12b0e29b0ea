// src/orchestrator.rs
//! One pipeline cycle, end to end:
//!
//! 1. auto-approve expired reviews, then publish everything approved
//!    (this doubles as the retry sweep for earlier publish failures)
//! 2. drop skipped / pending entries past retention (approved ones stay
//!    until they publish)
//! 3. ask the quota how many new articles this job may produce, counting
//!    what is already queued
//! 4. ingest, drop seen / already queued fingerprints
//! 5. select, generate (with a timeout), enqueue
//! 6. review mode: notify per article plus one pending summary;
//!    automated mode: approve and publish immediately
//!
//! Cycles never overlap; a second trigger gets `CycleError::AlreadyRunning`.

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::clock::SharedClock;
use crate::generate::DynGenerator;
use crate::ingest::{self, types::SourceProvider};
use crate::ledger::Ledger;
use crate::notify::{messages, NotifierMux};
use crate::publish::{DraftRequest, DynPublisher, PublishedDraft};
use crate::quota::QuotaBook;
use crate::review::{ArticleStatus, PendingArticle, ReviewQueue};
use crate::selector::Selector;
use crate::store::StoreError;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("cycle_runs_total", "Pipeline cycles started.");
        describe_counter!("articles_enqueued_total", "Articles put up for review.");
        describe_counter!("articles_published_total", "Drafts created and recorded.");
        describe_counter!("publish_failures_total", "Publish attempts that failed.");
        describe_counter!("generation_failures_total", "Candidates the generator gave up on.");
        describe_gauge!("review_pending", "Articles waiting for an operator decision.");
        describe_histogram!("cycle_duration_ms", "Wall time of one cycle in milliseconds.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Generated articles wait for an operator (or the timeout).
    #[default]
    Review,
    /// Generated articles are approved and published in the same cycle.
    Automated,
}

impl FromStr for PublishMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "review" => Ok(PublishMode::Review),
            "automated" | "auto" => Ok(PublishMode::Automated),
            other => Err(format!("unknown publish mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub mode: PublishMode,
    pub review_timeout: Duration,
    pub retention: Duration,
    pub generation_timeout: std::time::Duration,
    /// Labels every draft carries; the article's type tag is appended.
    pub labels: Vec<String>,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            mode: PublishMode::Review,
            review_timeout: Duration::minutes(30),
            retention: Duration::hours(24),
            generation_timeout: std::time::Duration::from_secs(90),
            labels: vec!["Premier League".into(), "Football".into()],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("a cycle is already running")]
    AlreadyRunning,
    #[error("review queue: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published { draft: PublishedDraft },
    /// Publisher returned nothing; the article stays approved.
    Failed,
    /// Draft exists but the ledger write failed; the article stays approved.
    LedgerFailed { draft: PublishedDraft },
    /// Already recorded by an earlier attempt; just cleared from the queue.
    AlreadyRecorded,
    /// Another task is publishing this id right now.
    InFlight,
    /// Unknown id or not approved.
    NotApproved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub id: String,
    #[serde(flatten)]
    pub outcome: PublishOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub started_at: Option<DateTime<Utc>>,
    pub auto_approved: Vec<String>,
    pub published: Vec<PublishResult>,
    pub purged: usize,
    /// Approved but unpublished past retention; kept, retried every cycle.
    pub stale_approved: Vec<String>,
    pub remaining_for_job: u32,
    pub fetched: usize,
    pub fresh: usize,
    pub selected: usize,
    pub generation_failures: usize,
    pub enqueued: Vec<String>,
    pub summary_sent: bool,
}

impl CycleReport {
    pub fn published_count(&self) -> usize {
        self.published
            .iter()
            .filter(|r| matches!(r.outcome, PublishOutcome::Published { .. }))
            .count()
    }
}

/// The pluggable side of the pipeline.
pub struct Collaborators {
    pub providers: Vec<Box<dyn SourceProvider>>,
    pub selector: Selector,
    pub generator: DynGenerator,
    pub publisher: DynPublisher,
    pub notifier: NotifierMux,
}

pub struct Orchestrator {
    queue: Arc<ReviewQueue>,
    ledger: Arc<Ledger>,
    quota: Arc<QuotaBook>,
    collab: Collaborators,
    settings: CycleSettings,
    clock: SharedClock,
    cycle_lock: tokio::sync::Mutex<()>,
    in_flight: Mutex<HashSet<String>>,
}

/// Removes the id from the in-flight set when the publish attempt ends.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.id);
    }
}

impl Orchestrator {
    pub fn new(
        queue: Arc<ReviewQueue>,
        ledger: Arc<Ledger>,
        quota: Arc<QuotaBook>,
        collab: Collaborators,
        settings: CycleSettings,
        clock: SharedClock,
    ) -> Self {
        ensure_metrics_described();
        Self {
            queue,
            ledger,
            quota,
            collab,
            settings,
            clock,
            cycle_lock: tokio::sync::Mutex::new(()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn queue(&self) -> &Arc<ReviewQueue> {
        &self.queue
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn quota(&self) -> &Arc<QuotaBook> {
        &self.quota
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    pub fn is_cycle_running(&self) -> bool {
        self.cycle_lock.try_lock().is_err()
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let _cycle = self
            .cycle_lock
            .try_lock()
            .map_err(|_| CycleError::AlreadyRunning)?;
        let t0 = std::time::Instant::now();
        counter!("cycle_runs_total").increment(1);

        let now = self.clock.now();
        let mut report = CycleReport {
            started_at: Some(now),
            ..CycleReport::default()
        };
        info!(target: "cycle", mode = ?self.settings.mode, "cycle started");

        report.auto_approved = self.queue.auto_approve_expired(self.settings.review_timeout)?;
        report.published = self.publish_approved().await;

        report.purged = match self.queue.purge_settled_older_than(self.settings.retention) {
            Ok(n) => n,
            Err(e) => {
                warn!(target: "cycle", error = %e, "retention sweep failed");
                0
            }
        };
        report.stale_approved = self.queue.approved_older_than(self.settings.retention);
        if !report.stale_approved.is_empty() {
            warn!(
                target: "cycle",
                ids = ?report.stale_approved,
                "approved articles past retention are still unpublished"
            );
        }

        let queued = u32::try_from(self.queue.awaiting_publish()).unwrap_or(u32::MAX);
        report.remaining_for_job = self.quota.remaining_for_job(now.date_naive(), queued);
        if report.remaining_for_job == 0 {
            info!(target: "cycle", "daily post limit reached; nothing new this cycle");
            self.finish(&report, t0);
            return Ok(report);
        }

        let fetched = ingest::run_once(&self.collab.providers).await;
        report.fetched = fetched.items.len();
        let queued = self.queue.queued_fingerprints();
        let fresh: Vec<_> = self
            .ledger
            .filter_unseen(fetched.items)
            .into_iter()
            .filter(|it| !queued.contains(&it.fingerprint))
            .collect();
        report.fresh = fresh.len();

        let selected = self.collab.selector.select_top(
            fresh,
            report.remaining_for_job as usize,
            self.clock.now(),
        );
        report.selected = selected.len();
        info!(
            target: "cycle",
            fetched = report.fetched,
            fresh = report.fresh,
            selected = report.selected,
            "candidates selected"
        );

        for item in selected {
            let generated = match tokio::time::timeout(
                self.settings.generation_timeout,
                self.collab.generator.generate(&item),
            )
            .await
            {
                Ok(Some(g)) => g,
                Ok(None) => {
                    counter!("generation_failures_total").increment(1);
                    report.generation_failures += 1;
                    warn!(target: "cycle", title = %item.title, "generation failed; skipping");
                    continue;
                }
                Err(_) => {
                    counter!("generation_failures_total").increment(1);
                    report.generation_failures += 1;
                    warn!(target: "cycle", title = %item.title, "generation timed out; skipping");
                    continue;
                }
            };

            let id = match self.queue.enqueue(item, generated) {
                Ok(id) => id,
                Err(e) => {
                    error!(target: "cycle", error = %e, "could not persist generated article");
                    continue;
                }
            };
            counter!("articles_enqueued_total").increment(1);
            report.enqueued.push(id.clone());

            match self.settings.mode {
                PublishMode::Automated => {
                    if let Err(e) = self.queue.approve([id.as_str()]) {
                        error!(target: "cycle", %id, error = %e, "auto-approval not persisted");
                        continue;
                    }
                    report
                        .published
                        .extend(self.publish_ids(std::slice::from_ref(&id)).await);
                }
                PublishMode::Review => {
                    if let Some(article) = self.queue.get(&id) {
                        let minutes = self.settings.review_timeout.num_minutes();
                        self.collab
                            .notifier
                            .send(&messages::review_message(&article, minutes))
                            .await;
                    }
                }
            }
        }

        if self.settings.mode == PublishMode::Review && !report.enqueued.is_empty() {
            if let Some(summary) = messages::pending_summary(&self.queue.list_pending()) {
                report.summary_sent = self.collab.notifier.send(&summary).await;
            }
        }

        self.finish(&report, t0);
        Ok(report)
    }

    fn finish(&self, report: &CycleReport, t0: std::time::Instant) {
        histogram!("cycle_duration_ms").record(t0.elapsed().as_secs_f64() * 1000.0);
        gauge!("cycle_last_run_ts").set(self.clock.now().timestamp() as f64);
        info!(
            target: "cycle",
            auto_approved = report.auto_approved.len(),
            published = report.published_count(),
            enqueued = report.enqueued.len(),
            generation_failures = report.generation_failures,
            "cycle finished"
        );
    }

    /// Publish every approved article still in the queue, oldest first.
    pub async fn publish_approved(&self) -> Vec<PublishResult> {
        let approved = self.queue.list_approved();
        if !approved.is_empty() {
            info!(target: "publish", count = approved.len(), "publishing approved articles");
        }
        let mut out = Vec::with_capacity(approved.len());
        for article in approved {
            let outcome = self.publish_article(&article).await;
            out.push(PublishResult {
                id: article.id.clone(),
                outcome,
            });
        }
        out
    }

    /// Publish specific ids; ids not currently approved are reported as such.
    pub async fn publish_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<PublishResult> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            let outcome = match self.queue.get(id) {
                Some(a) if a.status == ArticleStatus::Approved => self.publish_article(&a).await,
                _ => PublishOutcome::NotApproved,
            };
            out.push(PublishResult {
                id: id.to_string(),
                outcome,
            });
        }
        out
    }

    fn claim(&self, id: &str) -> Option<InFlight<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        set.insert(id.to_string()).then(|| InFlight {
            set: &self.in_flight,
            id: id.to_string(),
        })
    }

    /// Draft → ledger → queue removal → quota → operator report.
    pub async fn publish_article(&self, article: &PendingArticle) -> PublishOutcome {
        let Some(_claim) = self.claim(&article.id) else {
            debug!(target: "publish", id = %article.id, "already being published");
            return PublishOutcome::InFlight;
        };
        // a concurrent publisher may have finished between listing and claiming
        match self.queue.get(&article.id) {
            Some(a) if a.status == ArticleStatus::Approved => {}
            _ => return PublishOutcome::NotApproved,
        }

        let fp = &article.source_item.fingerprint;
        if self
            .ledger
            .entry(fp)
            .is_some_and(|e| e.recorded_at >= article.created_at)
        {
            info!(target: "publish", id = %article.id, "already recorded; clearing from queue");
            self.remove_published(&article.id);
            return PublishOutcome::AlreadyRecorded;
        }

        let req = DraftRequest::from_article(article, &self.settings.labels);
        let Some(draft) = self.collab.publisher.publish(&req).await else {
            counter!("publish_failures_total").increment(1);
            warn!(target: "publish", id = %article.id, "publish failed; will retry next cycle");
            return PublishOutcome::Failed;
        };

        if let Err(e) = self.ledger.record(fp, &article.generated_title, &draft.edit_url) {
            counter!("publish_failures_total").increment(1);
            error!(
                target: "publish",
                id = %article.id,
                post_id = %draft.post_id,
                error = %e,
                "draft created but ledger write failed; article stays approved"
            );
            return PublishOutcome::LedgerFailed { draft };
        }
        self.remove_published(&article.id);
        self.quota.record_publish(self.clock.now().date_naive());
        counter!("articles_published_total").increment(1);
        info!(target: "publish", id = %article.id, post_id = %draft.post_id, "article published");

        self.collab
            .notifier
            .send(&messages::published_report(article, &draft))
            .await;
        PublishOutcome::Published { draft }
    }

    fn remove_published(&self, id: &str) {
        // the ledger already holds it, so a leftover entry is cleared by the next sweep
        if let Err(e) = self.queue.remove(id) {
            warn!(target: "publish", %id, error = %e, "could not remove published article from queue");
        }
    }
}
