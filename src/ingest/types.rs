// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One candidate news item from a feed. `fingerprint` is derived from the
/// canonical link and is the only identity used for de-duplication.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CandidateItem {
    pub title: String,
    pub summary: String,
    pub canonical_link: String,
    /// Best-effort; `None` when the feed date could not be parsed.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    pub fingerprint: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_alt: Option<String>,
}

impl CandidateItem {
    /// Builds an item and derives its fingerprint from `link`.
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        link: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        let link = canonical_link(&link.into());
        Self {
            title: title.into(),
            summary: summary.into(),
            fingerprint: fingerprint_for(&link),
            canonical_link: link,
            published_at: None,
            source_name: source_name.into(),
            image_url: None,
            image_alt: None,
        }
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    pub fn with_image(mut self, url: impl Into<String>, alt: Option<String>) -> Self {
        self.image_url = Some(url.into());
        self.image_alt = alt;
        self
    }

    /// Lower-cased `title + " " + summary`, the text every keyword rule looks at.
    pub fn topic_text(&self) -> String {
        format!("{} {}", self.title, self.summary).to_lowercase()
    }
}

/// Trim and drop the `#fragment`; tracking fragments must not split identity.
pub fn canonical_link(link: &str) -> String {
    let t = link.trim();
    match t.split_once('#') {
        Some((base, _)) => base.to_string(),
        None => t.to_string(),
    }
}

/// Lower-case hex SHA-256 of the canonical link.
pub fn fingerprint_for(link: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;
    let digest = Sha256::digest(canonical_link(link).as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>>;
    fn name(&self) -> &str;
}
