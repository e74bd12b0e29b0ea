// src/app.rs
//! Wiring: state files, collaborators and the orchestrator built from config.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock::SharedClock;
use crate::config::{Credentials, PipelineConfig};
use crate::generate::{GeminiGenerator, StaticGenerator};
use crate::ingest::providers::RssFeedProvider;
use crate::ingest::types::SourceProvider;
use crate::ledger::{Ledger, LedgerDoc};
use crate::notify::{DiscordNotifier, LogNotifier, NotifierMux, TelegramClient, TelegramNotifier};
use crate::orchestrator::{Collaborators, Orchestrator};
use crate::publish::{BloggerPublisher, DryRunPublisher};
use crate::quota::{DailyQuota, QuotaBook};
use crate::review::{QueueDoc, ReviewQueue};
use crate::selector::Selector;
use crate::store::JsonFile;

pub const QUEUE_FILE: &str = "review_queue.json";
pub const LEDGER_FILE: &str = "ledger.json";
pub const QUOTA_FILE: &str = "daily_quota.json";

#[derive(Debug, Clone)]
pub struct StatePaths {
    pub queue: PathBuf,
    pub ledger: PathBuf,
    pub quota: PathBuf,
}

impl StatePaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            queue: dir.join(QUEUE_FILE),
            ledger: dir.join(LEDGER_FILE),
            quota: dir.join(QUOTA_FILE),
        }
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(now.date_naive().and_time(NaiveTime::MIN), Utc)
}

/// Open the persisted state under `cfg.pipeline.state_dir` and assemble the
/// orchestrator. A corrupt review queue is fatal.
pub fn build_orchestrator(
    cfg: &PipelineConfig,
    collab: Collaborators,
    clock: SharedClock,
) -> Result<Orchestrator> {
    let dir = &cfg.pipeline.state_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating state dir {}", dir.display()))?;
    let paths = StatePaths::in_dir(dir);

    let queue = ReviewQueue::open(JsonFile::<QueueDoc>::new(&paths.queue), clock.clone())
        .with_context(|| format!("opening review queue {}", paths.queue.display()))?;
    let ledger = Arc::new(Ledger::open(
        JsonFile::<LedgerDoc>::new(&paths.ledger),
        cfg.seen_policy(),
        clock.clone(),
    ));

    let now = clock.now();
    let quota = QuotaBook::open(
        cfg.rate_limiter(),
        JsonFile::<DailyQuota>::new(&paths.quota),
        now.date_naive(),
        || ledger.recorded_since(start_of_day(now)) as u32,
    );

    Ok(Orchestrator::new(
        Arc::new(queue),
        ledger,
        Arc::new(quota),
        collab,
        cfg.cycle_settings(),
        clock,
    ))
}

fn feed_providers(cfg: &PipelineConfig, clock: &SharedClock) -> Result<Vec<Box<dyn SourceProvider>>> {
    let policy = cfg.feeds.policy();
    cfg.feeds
        .urls
        .iter()
        .map(|url| -> Result<Box<dyn SourceProvider>> {
            let p = RssFeedProvider::from_url(url.as_str())?
                .with_policy(policy.clone())
                .with_clock(clock.clone());
            Ok(Box::new(p) as Box<dyn SourceProvider>)
        })
        .collect()
}

/// Live feeds, Gemini, Blogger drafts, Telegram (+ Discord if configured).
pub fn production_collaborators(
    cfg: &PipelineConfig,
    creds: &Credentials,
    clock: &SharedClock,
) -> Result<Collaborators> {
    let generator = GeminiGenerator::new(
        creds.gemini_api_key.clone(),
        cfg.pipeline.gemini_model.as_deref(),
    )
    .context("building gemini client")?;
    let publisher = BloggerPublisher::new(creds.blog_id.clone(), creds.blogger_access_token.clone())?;

    let telegram = TelegramClient::new(creds.telegram_bot_token.clone());
    let mut notifier = NotifierMux::new().with(Arc::new(TelegramNotifier::new(
        telegram,
        creds.owner_chat_id,
    )));
    if let Some(hook) = &creds.discord_webhook_url {
        notifier = notifier.with(Arc::new(DiscordNotifier::new(hook.clone())));
    }

    Ok(Collaborators {
        providers: feed_providers(cfg, clock)?,
        selector: Selector::new(&cfg.selector),
        generator: Arc::new(generator),
        publisher: Arc::new(publisher),
        notifier,
    })
}

/// Live feeds, but nothing leaves the process: echo generator, recording
/// publisher, log-only notifications.
pub fn dry_run_collaborators(cfg: &PipelineConfig, clock: &SharedClock) -> Result<Collaborators> {
    Ok(Collaborators {
        providers: feed_providers(cfg, clock)?,
        selector: Selector::new(&cfg.selector),
        generator: Arc::new(StaticGenerator),
        publisher: Arc::new(DryRunPublisher::new()),
        notifier: NotifierMux::new().with(Arc::new(LogNotifier)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn start_of_day_truncates_to_midnight_utc() {
        let t = Utc.with_ymd_and_hms(2025, 8, 16, 17, 45, 3).unwrap();
        assert_eq!(
            start_of_day(t),
            Utc.with_ymd_and_hms(2025, 8, 16, 0, 0, 0).unwrap()
        );
    }
}
