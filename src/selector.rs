// src/selector.rs
//! Candidate selection: on-topic filter, newsworthiness score, top-N ranking.
//!
//! Everything here is pure. `now` is passed in so ranking is deterministic.
//!
//! Score = 2 × (distinct high-value keywords present)
//!       + 3 if any priority entity is present (once, no stacking)
//!       + recency bonus: 3 if younger than 12h, 2 if younger than 24h.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::CandidateItem;

pub const HIGH_VALUE_WEIGHT: i32 = 2;
pub const PRIORITY_ENTITY_WEIGHT: i32 = 3;

/// Keyword lists, usually the `[selector]` table of the pipeline TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectorConfig {
    #[serde(default = "default_topic_keywords")]
    pub topic_keywords: Vec<String>,
    #[serde(default = "default_exclusion_keywords")]
    pub exclusion_keywords: Vec<String>,
    #[serde(default = "default_high_value_keywords")]
    pub high_value_keywords: Vec<String>,
    #[serde(default = "default_priority_entities")]
    pub priority_entities: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            topic_keywords: default_topic_keywords(),
            exclusion_keywords: default_exclusion_keywords(),
            high_value_keywords: default_high_value_keywords(),
            priority_entities: default_priority_entities(),
        }
    }
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_topic_keywords() -> Vec<String> {
    owned(&[
        "premier league", "epl", "football", "soccer", "arsenal", "chelsea",
        "liverpool", "manchester united", "manchester city", "tottenham", "spurs",
        "west ham", "everton", "aston villa", "newcastle", "brighton",
        "crystal palace", "fulham", "brentford", "wolverhampton", "nottingham forest",
        "bournemouth", "burnley", "leeds", "sunderland", "match", "manager",
        "transfer", "signing", "club",
    ])
}

fn default_exclusion_keywords() -> Vec<String> {
    owned(&["cricket", "rugby", "tennis", "formula 1", "nfl", "nba"])
}

fn default_high_value_keywords() -> Vec<String> {
    owned(&[
        "transfer", "signing", "injury", "suspended", "banned", "record", "goal",
        "hat-trick", "winner", "defeat", "victory", "comeback", "debut",
        "milestone", "controversy", "red card", "penalty",
    ])
}

fn default_priority_entities() -> Vec<String> {
    owned(&[
        "manchester united", "liverpool", "arsenal", "chelsea", "manchester city",
        "tottenham",
    ])
}

/// Lower-case, trim, drop empties and duplicates (first occurrence wins).
fn clean_keywords(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let k = it.trim().to_lowercase();
        if !k.is_empty() && !out.contains(&k) {
            out.push(k);
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Selector {
    topic: Vec<String>,
    exclusions: Vec<String>,
    high_value: Vec<String>,
    priority: Vec<String>,
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(&SelectorConfig::default())
    }
}

impl Selector {
    pub fn new(cfg: &SelectorConfig) -> Self {
        Self {
            topic: clean_keywords(&cfg.topic_keywords),
            exclusions: clean_keywords(&cfg.exclusion_keywords),
            high_value: clean_keywords(&cfg.high_value_keywords),
            priority: clean_keywords(&cfg.priority_entities),
        }
    }

    pub fn is_on_topic(&self, item: &CandidateItem) -> bool {
        let text = item.topic_text();
        self.topic.iter().any(|k| text.contains(k.as_str()))
            && !self.exclusions.iter().any(|k| text.contains(k.as_str()))
    }

    pub fn filter_on_topic(&self, items: Vec<CandidateItem>) -> Vec<CandidateItem> {
        items.into_iter().filter(|it| self.is_on_topic(it)).collect()
    }

    pub fn score(&self, item: &CandidateItem, now: DateTime<Utc>) -> i32 {
        let text = item.topic_text();

        let keywords = self
            .high_value
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .count() as i32;
        let priority = if self.priority.iter().any(|e| text.contains(e.as_str())) {
            PRIORITY_ENTITY_WEIGHT
        } else {
            0
        };

        keywords * HIGH_VALUE_WEIGHT + priority + recency_bonus(item.published_at, now)
    }

    /// On-topic items, highest score first (ties keep input order), at most
    /// `max_count`, never an item scoring ≤ 0.
    pub fn select_top(
        &self,
        items: Vec<CandidateItem>,
        max_count: usize,
        now: DateTime<Utc>,
    ) -> Vec<CandidateItem> {
        let mut scored: Vec<(CandidateItem, i32)> = self
            .filter_on_topic(items)
            .into_iter()
            .map(|it| {
                let s = self.score(&it, now);
                (it, s)
            })
            .collect();
        // sort_by is stable
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let top: Vec<CandidateItem> = scored
            .into_iter()
            .take(max_count)
            .filter(|(_, s)| *s > 0)
            .map(|(it, _)| it)
            .collect();
        tracing::debug!(target: "selector", selected = top.len(), max_count, "selected top stories");
        top
    }
}

/// +3 under 12h old, +2 under 24h, otherwise 0. Unknown publish time is 0.
pub fn recency_bonus(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i32 {
    let Some(at) = published_at else {
        return 0;
    };
    let age = now.signed_duration_since(at);
    if age < Duration::hours(12) {
        3
    } else if age < Duration::hours(24) {
        2
    } else {
        0
    }
}
