use super::{Notification, Notifier};
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Discord has a 4096-char embed description limit.
const MAX_DESCRIPTION: usize = 4000;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn post(&self, payload: &DiscordWebhookPayload) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, n: &Notification) -> Result<()> {
        self.post(&DiscordWebhookPayload::from_notification(n)).await
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordImage {
    url: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<DiscordImage>,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    /// First line becomes the embed title, the rest the description.
    fn from_notification(n: &Notification) -> Self {
        let trimmed = n.message.trim();
        let (title, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: title.chars().take(256).collect(),
                description: rest.trim().chars().take(MAX_DESCRIPTION).collect(),
                image: n.image_url.clone().map(|url| DiscordImage { url }),
            }],
        }
    }
}
