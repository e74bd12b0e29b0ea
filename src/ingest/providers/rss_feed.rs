use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use crate::clock::{self, SharedClock};
use crate::ingest::image::scrape_cover_image;
use crate::ingest::types::{CandidateItem, SourceProvider};
use crate::ingest::{normalize_text, parse_published};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
    #[serde(rename = "media:thumbnail", alias = "thumbnail", default)]
    thumbnails: Vec<MediaRef>,
    #[serde(rename = "media:content", alias = "content", default)]
    media: Vec<MediaRef>,
    enclosure: Option<MediaRef>,
}
#[derive(Debug, Deserialize)]
struct MediaRef {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    mime: Option<String>,
    #[serde(rename = "@medium")]
    medium: Option<String>,
}

impl MediaRef {
    fn image_url(&self) -> Option<&str> {
        let url = self.url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        let typed_non_image = self
            .mime
            .as_deref()
            .is_some_and(|m| !m.starts_with("image/"));
        let medium_non_image = self.medium.as_deref().is_some_and(|m| m != "image");
        if typed_non_image || medium_non_image {
            None
        } else {
            Some(url)
        }
    }
}

/// Per-feed ingestion policy.
#[derive(Debug, Clone)]
pub struct FeedPolicy {
    /// Drop entries older than this; entries with no parsable date are kept.
    pub hours_back: Option<u64>,
    pub max_entries: usize,
    /// Skip entries that end up without an image.
    pub require_image: bool,
    /// Look for `og:image` on the article page when the feed has no image (HTTP mode only).
    pub scrape_images: bool,
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            hours_back: Some(24),
            max_entries: 20,
            require_image: true,
            scrape_images: true,
        }
    }
}

const SUMMARY_MAX_CHARS: usize = 600;
const TITLE_MAX_CHARS: usize = 300;

pub struct RssFeedProvider {
    name: String,
    mode: Mode,
    policy: FeedPolicy,
    clock: SharedClock,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeedProvider {
    /// Parse a fixed XML document instead of fetching (tests, dry runs).
    pub fn from_fixture_str(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Fixture(xml.to_string()),
            policy: FeedPolicy {
                scrape_images: false,
                ..FeedPolicy::default()
            },
            clock: clock::system(),
        }
    }

    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .user_agent("matchday-desk/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("build feed http client")?;
        Ok(Self {
            name: url.clone(),
            mode: Mode::Http { url, client },
            policy: FeedPolicy::default(),
            clock: clock::system(),
        })
    }

    pub fn with_policy(mut self, policy: FeedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    async fn parse_items_from_str(&self, s: &str) -> Result<Vec<CandidateItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml from {}", self.name))?;

        let source_name = rss
            .channel
            .title
            .as_deref()
            .map(|t| normalize_text(t, TITLE_MAX_CHARS))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.name.clone());
        let cutoff = self
            .policy
            .hours_back
            .map(|h| self.clock.now() - ChronoDuration::hours(h as i64));

        let mut out = Vec::new();
        for it in rss.channel.item.into_iter().take(self.policy.max_entries) {
            let title = normalize_text(it.title.as_deref().unwrap_or_default(), TITLE_MAX_CHARS);
            let link = it.link.as_deref().map(str::trim).unwrap_or_default().to_string();
            if title.is_empty() || link.is_empty() {
                continue;
            }

            let published_at = it
                .pub_date
                .as_deref()
                .or(it.dc_date.as_deref())
                .and_then(parse_published);
            if let (Some(cut), Some(at)) = (cutoff, published_at) {
                if at < cut {
                    continue;
                }
            }

            let summary = normalize_text(
                it.description.as_deref().unwrap_or_default(),
                SUMMARY_MAX_CHARS,
            );

            let mut image = it
                .thumbnails
                .iter()
                .chain(it.media.iter())
                .chain(it.enclosure.iter())
                .find_map(MediaRef::image_url)
                .map(str::to_string);

            if image.is_none() && self.policy.scrape_images {
                if let Mode::Http { client, .. } = &self.mode {
                    image = scrape_cover_image(client, &link).await;
                }
            }

            if image.is_none() && self.policy.require_image {
                tracing::debug!(target: "ingest", %title, "skipping entry without image");
                continue;
            }

            let mut item = CandidateItem::new(title.clone(), summary, link, source_name.clone());
            item.published_at = published_at;
            if let Some(url) = image {
                item = item.with_image(url, Some(title));
            }
            out.push(item);
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s).await,
            Mode::Http { url, client } => {
                let body = match client.get(url).send().await {
                    Ok(resp) => resp
                        .error_for_status()
                        .with_context(|| format!("feed {url} non-2xx"))?
                        .text()
                        .await
                        .context("feed http .text()")?,
                    Err(e) => {
                        counter!("ingest_provider_errors_total").increment(1);
                        return Err(e).with_context(|| format!("feed http get {url}"));
                    }
                };
                self.parse_items_from_str(&body).await
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&pound;", "GBP ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    const XML: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Test Sport</title>
    <item>
      <title>Arsenal complete signing</title>
      <link>https://news.example/a</link>
      <description><![CDATA[<p>Deal done &amp; dusted.</p>]]></description>
      <pubDate>Sat, 16 Aug 2025 10:00:00 +0000</pubDate>
      <media:thumbnail width="240" height="135" url="https://img.example/a.jpg"/>
    </item>
    <item>
      <title>No picture here</title>
      <link>https://news.example/b</link>
      <description>Text only</description>
      <pubDate>Sat, 16 Aug 2025 11:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Old news</title>
      <link>https://news.example/c</link>
      <pubDate>Mon, 11 Aug 2025 11:00:00 +0000</pubDate>
      <enclosure url="https://img.example/c.jpg" type="image/jpeg" length="1"/>
    </item>
  </channel>
</rss>"#;

    fn clock_at_noon() -> SharedClock {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 8, 16, 12, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn requires_image_and_drops_stale_entries() {
        let p = RssFeedProvider::from_fixture_str("fixture", XML).with_clock(clock_at_noon());
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 1);
        let a = &items[0];
        assert_eq!(a.title, "Arsenal complete signing");
        assert_eq!(a.summary, "Deal done & dusted.");
        assert_eq!(a.source_name, "Test Sport");
        assert_eq!(a.image_url.as_deref(), Some("https://img.example/a.jpg"));
        assert!(a.published_at.is_some());
    }

    #[tokio::test]
    async fn lenient_policy_keeps_imageless_and_old_entries() {
        let p = RssFeedProvider::from_fixture_str("fixture", XML)
            .with_clock(clock_at_noon())
            .with_policy(FeedPolicy {
                hours_back: None,
                max_entries: 20,
                require_image: false,
                scrape_images: false,
            });
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].image_url.as_deref(), Some("https://img.example/c.jpg"));
    }
}
