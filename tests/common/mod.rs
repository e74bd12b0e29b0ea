// tests/common/mod.rs
// Shared in-memory harness for cycle-level tests.
#![allow(dead_code)]

use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;

use matchday_desk::clock::{ManualClock, SharedClock};
use matchday_desk::generate::{Generator, StaticGenerator};
use matchday_desk::ingest::providers::RssFeedProvider;
use matchday_desk::ingest::types::SourceProvider;
use matchday_desk::ledger::{Ledger, LedgerDoc, SeenPolicy};
use matchday_desk::notify::{MemoryNotifier, NotifierMux};
use matchday_desk::orchestrator::{Collaborators, CycleSettings, Orchestrator, PublishMode};
use matchday_desk::publish::{DraftRequest, DryRunPublisher, Publisher, PublishedDraft};
use matchday_desk::quota::{DailyQuota, QuotaBook, RateLimiter};
use matchday_desk::review::{QueueDoc, ReviewQueue};
use matchday_desk::selector::Selector;
use matchday_desk::store::MemoryStore;

pub const FIXTURE: &str = include_str!("../fixtures/sport_rss.xml");
/// Three qualifying stories.
pub const BUSY_FIXTURE: &str = include_str!("../fixtures/busy_rss.xml");

pub fn noon() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 16, 12, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    noon().date_naive()
}

pub struct Harness {
    pub orch: Arc<Orchestrator>,
    pub clock: Arc<ManualClock>,
    pub publisher: Arc<DryRunPublisher>,
    pub notes: Arc<MemoryNotifier>,
    pub queue_store: Arc<MemoryStore<QueueDoc>>,
    pub ledger_store: Arc<MemoryStore<LedgerDoc>>,
}

pub struct HarnessOpts {
    pub mode: PublishMode,
    pub generator: Arc<dyn Generator>,
    pub feed: &'static str,
    pub quota_used: u32,
    /// Delay in front of every publish call.
    pub publish_delay: Option<std::time::Duration>,
}

impl Default for HarnessOpts {
    fn default() -> Self {
        Self {
            mode: PublishMode::Review,
            generator: Arc::new(StaticGenerator),
            feed: FIXTURE,
            quota_used: 0,
            publish_delay: None,
        }
    }
}

/// Dry-run publisher that takes its time.
struct SlowPublisher {
    inner: Arc<DryRunPublisher>,
    delay: std::time::Duration,
}

#[async_trait::async_trait]
impl Publisher for SlowPublisher {
    async fn publish(&self, req: &DraftRequest) -> Option<PublishedDraft> {
        tokio::time::sleep(self.delay).await;
        self.inner.publish(req).await
    }

    fn name(&self) -> &'static str {
        "slow-dry-run"
    }
}

pub fn harness(opts: HarnessOpts) -> Harness {
    let clock = Arc::new(ManualClock::new(noon()));
    let shared: SharedClock = clock.clone();

    let queue_store = Arc::new(MemoryStore::<QueueDoc>::new());
    let ledger_store = Arc::new(MemoryStore::<LedgerDoc>::new());
    let queue = ReviewQueue::open(queue_store.clone(), shared.clone()).unwrap();
    let ledger = Ledger::open(ledger_store.clone(), SeenPolicy::Forever, shared.clone());
    let quota = QuotaBook::in_memory(
        RateLimiter::new(12, 4),
        DailyQuota {
            date: today(),
            count: opts.quota_used,
        },
    );

    let publisher = Arc::new(DryRunPublisher::new());
    let dyn_publisher: Arc<dyn Publisher> = match opts.publish_delay {
        Some(delay) => Arc::new(SlowPublisher {
            inner: publisher.clone(),
            delay,
        }),
        None => publisher.clone(),
    };
    let notes = Arc::new(MemoryNotifier::new());
    let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(
        RssFeedProvider::from_fixture_str("fixture", opts.feed).with_clock(shared.clone()),
    )];

    let collab = Collaborators {
        providers,
        selector: Selector::default(),
        generator: opts.generator,
        publisher: dyn_publisher,
        notifier: NotifierMux::new().with(notes.clone()),
    };
    let settings = CycleSettings {
        mode: opts.mode,
        ..CycleSettings::default()
    };
    let orch = Orchestrator::new(
        Arc::new(queue),
        Arc::new(ledger),
        Arc::new(quota),
        collab,
        settings,
        shared,
    );

    Harness {
        orch: Arc::new(orch),
        clock,
        publisher,
        notes,
        queue_store,
        ledger_store,
    }
}
