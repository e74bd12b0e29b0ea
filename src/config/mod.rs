// src/config/mod.rs
//! Pipeline configuration (TOML) and credentials (env only).
//!
//! Lookup order for the TOML file:
//! 1) $NEWSROOM_CONFIG_PATH (must exist)
//! 2) config/newsroom.toml
//! 3) built-in defaults
//!
//! Env overrides applied afterwards: REVIEW_TIMEOUT_MINUTES, NEWSROOM_MODE,
//! NEWSROOM_STATE_DIR.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::ingest::providers::FeedPolicy;
use crate::ledger::SeenPolicy;
use crate::orchestrator::{CycleSettings, PublishMode};
use crate::quota::RateLimiter;
use crate::selector::SelectorConfig;

pub const ENV_CONFIG_PATH: &str = "NEWSROOM_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/newsroom.toml";

fn default_review_timeout() -> i64 {
    30
}
fn default_retention_hours() -> i64 {
    24
}
fn default_generation_timeout() -> u64 {
    90
}
fn default_interval() -> u64 {
    180
}
fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}
fn default_labels() -> Vec<String> {
    vec!["Premier League".into(), "Football".into()]
}
fn default_max_daily() -> u32 {
    12
}
fn default_per_job() -> u32 {
    4
}
fn default_feed_urls() -> Vec<String> {
    vec![
        "https://www.bbc.co.uk/sport/football/rss.xml".into(),
        "https://www.skysports.com/rss/0114".into(),
        "https://www.premierleague.com/news/rss".into(),
    ]
}
fn default_hours_back() -> u64 {
    24
}
fn default_max_entries() -> usize {
    20
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default)]
    pub mode: PublishMode,
    #[serde(default = "default_review_timeout")]
    pub review_timeout_minutes: i64,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_interval")]
    pub cycle_interval_minutes: u64,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
    /// Overrides the Gemini model name.
    #[serde(default)]
    pub gemini_model: Option<String>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            mode: PublishMode::default(),
            review_timeout_minutes: default_review_timeout(),
            retention_hours: default_retention_hours(),
            generation_timeout_secs: default_generation_timeout(),
            cycle_interval_minutes: default_interval(),
            state_dir: default_state_dir(),
            labels: default_labels(),
            gemini_model: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_max_daily")]
    pub max_daily: u32,
    #[serde(default = "default_per_job")]
    pub per_job: u32,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_daily: default_max_daily(),
            per_job: default_per_job(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Absent or 0: a recorded fingerprint blocks forever.
    #[serde(default)]
    pub seen_window_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsSection {
    #[serde(default = "default_feed_urls")]
    pub urls: Vec<String>,
    /// 0 disables the age cutoff.
    #[serde(default = "default_hours_back")]
    pub hours_back: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_true")]
    pub require_image: bool,
    #[serde(default = "default_true")]
    pub scrape_images: bool,
}

impl Default for FeedsSection {
    fn default() -> Self {
        Self {
            urls: default_feed_urls(),
            hours_back: default_hours_back(),
            max_entries: default_max_entries(),
            require_image: true,
            scrape_images: true,
        }
    }
}

impl FeedsSection {
    pub fn policy(&self) -> FeedPolicy {
        FeedPolicy {
            hours_back: (self.hours_back > 0).then_some(self.hours_back),
            max_entries: self.max_entries,
            require_image: self.require_image,
            scrape_images: self.scrape_images,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub ledger: LedgerSection,
    #[serde(default)]
    pub feeds: FeedsSection,
    #[serde(default)]
    pub selector: SelectorConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: PipelineConfig = toml::from_str(s).context("parsing pipeline TOML")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid pipeline config {}", path.display()))
    }

    /// File lookup (see module docs) followed by env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_PATH))?
        } else {
            tracing::info!("no pipeline config file; using built-in defaults");
            Self::default()
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = env::var("REVIEW_TIMEOUT_MINUTES") {
            self.pipeline.review_timeout_minutes = v
                .trim()
                .parse()
                .map_err(|_| anyhow!("REVIEW_TIMEOUT_MINUTES must be an integer, got '{v}'"))?;
        }
        if let Ok(v) = env::var("NEWSROOM_MODE") {
            self.pipeline.mode = v.parse().map_err(|e: String| anyhow!("NEWSROOM_MODE: {e}"))?;
        }
        if let Ok(v) = env::var("NEWSROOM_STATE_DIR") {
            if !v.trim().is_empty() {
                self.pipeline.state_dir = PathBuf::from(v.trim());
            }
        }
        self.sanitize();
        Ok(())
    }

    fn sanitize(&mut self) {
        let p = &mut self.pipeline;
        if p.review_timeout_minutes < 1 {
            p.review_timeout_minutes = default_review_timeout();
        }
        if p.retention_hours < 1 {
            p.retention_hours = default_retention_hours();
        }
        if p.generation_timeout_secs == 0 {
            p.generation_timeout_secs = default_generation_timeout();
        }
        p.cycle_interval_minutes = p.cycle_interval_minutes.max(1);
        p.labels.retain(|l| !l.trim().is_empty());

        if self.limits.per_job > self.limits.max_daily {
            self.limits.per_job = self.limits.max_daily;
        }
        self.feeds.urls.retain(|u| u.starts_with("http"));
        self.feeds.max_entries = self.feeds.max_entries.max(1);
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.limits.max_daily, self.limits.per_job)
    }

    pub fn seen_policy(&self) -> SeenPolicy {
        SeenPolicy::from_hours(self.ledger.seen_window_hours)
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        let p = &self.pipeline;
        CycleSettings {
            mode: p.mode,
            review_timeout: chrono::Duration::minutes(p.review_timeout_minutes),
            retention: chrono::Duration::hours(p.retention_hours),
            generation_timeout: std::time::Duration::from_secs(p.generation_timeout_secs),
            labels: p.labels.clone(),
        }
    }

    pub fn cycle_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.pipeline.cycle_interval_minutes * 60)
    }
}

/// Secrets. Every field except the Discord webhook is mandatory.
#[derive(Clone)]
pub struct Credentials {
    pub gemini_api_key: String,
    pub blog_id: String,
    pub blogger_access_token: String,
    pub telegram_bot_token: String,
    pub owner_chat_id: i64,
    pub discord_webhook_url: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("blog_id", &self.blog_id)
            .field("owner_chat_id", &self.owner_chat_id)
            .field("discord", &self.discord_webhook_url.is_some())
            .finish_non_exhaustive()
    }
}

fn required(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(anyhow!("Missing {name} env var")),
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let owner = required("OWNER_CHAT_ID")?;
        let owner_chat_id = owner
            .parse()
            .map_err(|_| anyhow!("OWNER_CHAT_ID must be a numeric chat id"))?;
        Ok(Self {
            gemini_api_key: required("GEMINI_API_KEY")?,
            blog_id: required("BLOG_ID")?,
            blogger_access_token: required("BLOGGER_ACCESS_TOKEN")?,
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            owner_chat_id,
            discord_webhook_url: env::var("DISCORD_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }
}
