// src/notify/mod.rs
//! Operator notifications. Every channel is best-effort: the mux never
//! propagates an error, it only reports whether anything got through.

pub mod discord;
pub mod messages;
pub mod telegram;

use anyhow::Result;
use metrics::counter;
use std::sync::{Arc, Mutex};

pub use discord::DiscordNotifier;
pub use telegram::{BotUser, TelegramClient, TelegramNotifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub image_url: Option<String>,
}

impl Notification {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, url: Option<String>) -> Self {
        self.image_url = url;
        self
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, n: &Notification) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fan-out to all channels. `true` if at least one delivered.
#[derive(Clone, Default)]
pub struct NotifierMux {
    channels: Vec<Arc<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ch: Arc<dyn Notifier>) -> Self {
        self.channels.push(ch);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub async fn send(&self, n: &Notification) -> bool {
        let mut delivered = false;
        for ch in &self.channels {
            match ch.notify(n).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    counter!("notify_failures_total", "channel" => ch.name()).increment(1);
                    tracing::warn!(target: "notify", channel = ch.name(), error = ?e, "notification failed");
                }
            }
        }
        delivered
    }
}

/// Writes the message to the log. Always succeeds.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, n: &Notification) -> Result<()> {
        tracing::info!(target: "notify", image = ?n.image_url, "{}", n.message);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps everything it is sent. For tests and the dry-run binary.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, n: &Notification) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(n.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    #[async_trait::async_trait]
    impl Notifier for Broken {
        async fn notify(&self, _n: &Notification) -> Result<()> {
            anyhow::bail!("down")
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn mux_reports_any_delivery() {
        let n = Notification::text("hi");
        assert!(!NotifierMux::new().send(&n).await);
        assert!(!NotifierMux::new().with(Arc::new(Broken)).send(&n).await);

        let mem = Arc::new(MemoryNotifier::new());
        let mux = NotifierMux::new().with(Arc::new(Broken)).with(mem.clone());
        assert!(mux.send(&n).await);
        assert_eq!(mem.sent(), vec![n]);
    }
}
