// src/notify/telegram.rs
//! Telegram Bot API: messages to the operator chat and the `getUpdates`
//! long-poll the command listener reads from.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{Notification, Notifier};

const TELEGRAM_API: &str = "https://api.telegram.org";
const MAX_MESSAGE: usize = 4096;
const MAX_CAPTION: usize = 1024;

#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    token: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// The bot's own account, from `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

impl BotUser {
    /// `@username`, or the numeric id for bots without one.
    pub fn handle(&self) -> String {
        match &self.username {
            Some(u) => format!("@{u}"),
            None => self.id.to_string(),
        }
    }
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            token: token.into(),
            api_base: TELEGRAM_API.to_string(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let resp: ApiResponse<T> = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("telegram {method}"))?
            .json()
            .await
            .with_context(|| format!("telegram {method} body"))?;
        if !resp.ok {
            return Err(anyhow!(
                "telegram {method} rejected: {}",
                resp.description.unwrap_or_default()
            ));
        }
        resp.result
            .ok_or_else(|| anyhow!("telegram {method}: empty result"))
    }

    /// Checks the token; Telegram rejects `getMe` for a revoked or mistyped one.
    pub async fn get_me(&self) -> Result<BotUser> {
        self.call("getMe", json!({}), Duration::from_secs(10)).await
    }

    pub async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": clip(text, MAX_MESSAGE),
                    "disable_web_page_preview": true,
                }),
                Duration::from_secs(15),
            )
            .await?;
        Ok(())
    }

    pub async fn send_photo(&self, chat_id: i64, photo_url: &str, caption: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendPhoto",
                json!({
                    "chat_id": chat_id,
                    "photo": photo_url,
                    "caption": clip(caption, MAX_CAPTION),
                }),
                Duration::from_secs(30),
            )
            .await?;
        Ok(())
    }

    /// Long-poll; `offset` is one past the last update already handled.
    pub async fn get_updates(&self, offset: i64, poll_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": poll_secs,
                "allowed_updates": ["message"],
            }),
            Duration::from_secs(poll_secs + 10),
        )
        .await
    }
}

/// Delivers notifications to the operator's private chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: TelegramClient,
    chat_id: i64,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, chat_id: i64) -> Self {
        Self { client, chat_id }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, n: &Notification) -> Result<()> {
        if let Some(url) = &n.image_url {
            if n.message.chars().count() <= MAX_CAPTION {
                match self.client.send_photo(self.chat_id, url, &n.message).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        tracing::warn!(target: "notify", error = ?e, "telegram photo failed; sending text");
                    }
                }
            }
            let text = format!("Image: {url}\n\n{}", n.message);
            return self.client.send_text(self.chat_id, &text).await;
        }
        self.client.send_text(self.chat_id, &n.message).await
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_respects_char_limit() {
        assert_eq!(clip("short", 10), "short");
        let long = "é".repeat(20);
        let c = clip(&long, 10);
        assert_eq!(c.chars().count(), 10);
        assert!(c.ends_with('…'));
    }

    #[test]
    fn get_me_result_and_rejection_deserialize() {
        let raw = r#"{"ok":true,"result":{"id":99,"is_bot":true,"first_name":"Desk","username":"matchday_desk_bot"}}"#;
        let r: ApiResponse<BotUser> = serde_json::from_str(raw).unwrap();
        let me = r.result.unwrap();
        assert_eq!(me.id, 99);
        assert_eq!(me.handle(), "@matchday_desk_bot");

        let raw = r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#;
        let r: ApiResponse<BotUser> = serde_json::from_str(raw).unwrap();
        assert!(!r.ok);
        assert_eq!(r.description.as_deref(), Some("Unauthorized"));
        assert!(r.result.is_none());
    }

    #[test]
    fn updates_deserialize_without_message() {
        let raw = r#"{"ok":true,"result":[{"update_id":7},{"update_id":8,"message":{"chat":{"id":42},"text":"/skip"}}]}"#;
        let r: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        let ups = r.result.unwrap();
        assert!(ups[0].message.is_none());
        assert_eq!(ups[1].message.as_ref().unwrap().chat.id, 42);
    }
}
