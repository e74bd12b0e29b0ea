// src/quota.rs
//! Daily / per-job publish limits.
//!
//! `DailyQuota` is a plain value; `RateLimiter` holds the limits and works on
//! a quota passed in. `QuotaBook` is the orchestrator's owned copy, saved
//! best-effort after every change. The ledger is the durable record of what
//! was published; this counter only has to be close.
//!
//! Articles already queued (pending or approved) will publish later today, so
//! they are charged against the daily cap before any new work is planned.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::store::Persist;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuota {
    pub date: NaiveDate,
    pub count: u32,
}

impl DailyQuota {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, count: 0 }
    }

    /// Reset `count` when `today` differs from the stored date. Returns true on reset.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.date != today {
            self.date = today;
            self.count = 0;
            true
        } else {
            false
        }
    }

    pub fn record_publish(&mut self, today: NaiveDate) {
        self.roll_over(today);
        self.count = self.count.saturating_add(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    pub max_daily: u32,
    pub per_job: u32,
}

impl RateLimiter {
    pub fn new(max_daily: u32, per_job: u32) -> Self {
        Self { max_daily, per_job }
    }

    pub fn remaining_today(&self, quota: &mut DailyQuota, today: NaiveDate) -> u32 {
        if quota.roll_over(today) {
            info!(target: "quota", %today, "daily post counter reset for new day");
        }
        self.max_daily.saturating_sub(quota.count)
    }

    pub fn remaining_for_job(&self, quota: &mut DailyQuota, today: NaiveDate) -> u32 {
        self.per_job.min(self.remaining_today(quota, today))
    }

    /// `remaining_for_job` with `queued` not-yet-published articles held back.
    pub fn remaining_with_backlog(
        &self,
        quota: &mut DailyQuota,
        today: NaiveDate,
        queued: u32,
    ) -> u32 {
        let left = self.remaining_today(quota, today).saturating_sub(queued);
        self.per_job.min(left)
    }
}

pub struct QuotaBook {
    limiter: RateLimiter,
    quota: Mutex<DailyQuota>,
    store: Option<Box<dyn Persist<DailyQuota>>>,
}

impl QuotaBook {
    pub fn in_memory(limiter: RateLimiter, quota: DailyQuota) -> Self {
        Self {
            limiter,
            quota: Mutex::new(quota),
            store: None,
        }
    }

    /// Load the saved quota. With nothing saved (or an unreadable file) the
    /// count for `today` is seeded from `published_today`.
    pub fn open(
        limiter: RateLimiter,
        store: impl Persist<DailyQuota> + 'static,
        today: NaiveDate,
        published_today: impl FnOnce() -> u32,
    ) -> Self {
        let quota = match store.load() {
            Ok(Some(q)) => q,
            Ok(None) => DailyQuota {
                date: today,
                count: published_today(),
            },
            Err(e) => {
                warn!(target: "quota", error = %e, "quota state unreadable; seeding from ledger");
                DailyQuota {
                    date: today,
                    count: published_today(),
                }
            }
        };
        Self {
            limiter,
            quota: Mutex::new(quota),
            store: Some(Box::new(store)),
        }
    }

    pub fn limiter(&self) -> RateLimiter {
        self.limiter
    }

    pub fn snapshot(&self) -> DailyQuota {
        *self.quota.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// New articles this job may produce, given `queued` articles still
    /// waiting to be published.
    pub fn remaining_for_job(&self, today: NaiveDate, queued: u32) -> u32 {
        let mut q = self.quota.lock().unwrap_or_else(|p| p.into_inner());
        let before = *q;
        let left = self.limiter.remaining_with_backlog(&mut q, today, queued);
        if *q != before {
            self.save(&q);
        }
        info!(
            target: "quota",
            count = q.count,
            max_daily = self.limiter.max_daily,
            queued,
            remaining_for_job = left,
            "daily posts"
        );
        left
    }

    pub fn record_publish(&self, today: NaiveDate) {
        let mut q = self.quota.lock().unwrap_or_else(|p| p.into_inner());
        q.record_publish(today);
        self.save(&q);
    }

    fn save(&self, q: &DailyQuota) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(q) {
                warn!(target: "quota", error = %e, "quota save failed; counter is in-memory only");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    #[test]
    fn remaining_for_job_is_min_of_job_and_day() {
        let lim = RateLimiter::new(12, 4);
        let mut q = DailyQuota { date: d(16), count: 10 };
        assert_eq!(lim.remaining_for_job(&mut q, d(16)), 2);
        q.count = 3;
        assert_eq!(lim.remaining_for_job(&mut q, d(16)), 4);
        q.count = 15;
        assert_eq!(lim.remaining_today(&mut q, d(16)), 0);
    }

    #[test]
    fn rollover_resets_once() {
        let lim = RateLimiter::new(12, 4);
        let mut q = DailyQuota { date: d(16), count: 12 };
        assert_eq!(lim.remaining_today(&mut q, d(17)), 12);
        q.record_publish(d(17));
        assert_eq!(lim.remaining_today(&mut q, d(17)), 11);
        assert_eq!(q.count, 1);
    }

    #[test]
    fn book_seeds_from_ledger_when_nothing_saved() {
        let store = std::sync::Arc::new(MemoryStore::<DailyQuota>::new());
        let book = QuotaBook::open(RateLimiter::new(12, 4), store.clone(), d(16), || 11);
        assert_eq!(book.remaining_for_job(d(16), 0), 1);
        book.record_publish(d(16));
        assert_eq!(book.remaining_for_job(d(16), 0), 0);

        let reopened = QuotaBook::open(RateLimiter::new(12, 4), store, d(16), || 0);
        assert_eq!(reopened.snapshot().count, 12);
    }

    #[test]
    fn queued_articles_count_against_the_day() {
        let lim = RateLimiter::new(12, 4);
        let mut q = DailyQuota { date: d(16), count: 11 };
        assert_eq!(lim.remaining_with_backlog(&mut q, d(16), 0), 1);
        assert_eq!(lim.remaining_with_backlog(&mut q, d(16), 1), 0);
        assert_eq!(lim.remaining_with_backlog(&mut q, d(16), 5), 0);

        q.count = 2;
        assert_eq!(lim.remaining_with_backlog(&mut q, d(16), 3), 4);
        assert_eq!(lim.remaining_with_backlog(&mut q, d(16), 7), 3);
    }
}
