// src/ingest/mod.rs
pub mod image;
pub mod providers;
pub mod types;

use crate::ingest::types::{CandidateItem, SourceProvider};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Candidate items parsed from feeds.");
        describe_counter!(
            "ingest_duplicates_total",
            "Items dropped because another item in the batch had the same fingerprint."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Normalize feed text: decode entities, strip tags, ASCII quotes, collapse
/// whitespace, cap at `max_chars`.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// Best-effort publish time: RFC 2822, RFC 3339, then a bare
/// `YYYY-MM-DDTHH:MM:SS` prefix read as UTC.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return Utc.timestamp_opt(dt.unix_timestamp(), 0).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let head: String = s.chars().take(19).collect();
    NaiveDateTime::parse_from_str(&head, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|n| Utc.from_utc_datetime(&n))
}

/// Keep the first item per fingerprint, preserving order.
pub fn dedup_batch(items: Vec<CandidateItem>) -> (Vec<CandidateItem>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    for it in items {
        if seen.insert(it.fingerprint.clone()) {
            keep.push(it);
        } else {
            dropped += 1;
        }
    }
    (keep, dropped)
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub items: Vec<CandidateItem>,
    pub provider_errors: usize,
    pub duplicates: usize,
}

/// Pull every provider once. A failing provider is logged and skipped.
pub async fn run_once(providers: &[Box<dyn SourceProvider>]) -> IngestReport {
    ensure_metrics_described();

    let mut raw = Vec::new();
    let mut provider_errors = 0usize;
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => {
                tracing::debug!(target: "ingest", provider = p.name(), items = v.len(), "provider fetched");
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
                provider_errors += 1;
            }
        }
    }

    let (items, duplicates) = dedup_batch(raw);
    counter!("ingest_items_total").increment(items.len() as u64);
    counter!("ingest_duplicates_total").increment(duplicates as u64);

    IngestReport {
        items,
        provider_errors,
        duplicates,
    }
}
