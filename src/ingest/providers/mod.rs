// src/ingest/providers/mod.rs
pub mod rss_feed;

pub use rss_feed::{FeedPolicy, RssFeedProvider};
