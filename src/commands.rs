// src/commands.rs
//! Operator commands, shared by the HTTP API and the Telegram listener.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notify::{messages, TelegramClient};
use crate::orchestrator::{Orchestrator, PublishOutcome, PublishResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// `/post id…` or `approve id…`
    Approve(Vec<String>),
    /// `/skip` or `skip`
    Skip,
    /// `/choice` or `status`
    Status,
}

impl OperatorCommand {
    /// `None` for anything that is not a command. Telegram's `/cmd@botname`
    /// form is accepted.
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        let head = words.next()?.to_ascii_lowercase();
        let head = head.split('@').next().unwrap_or_default();
        match head {
            "/post" | "approve" => Some(Self::Approve(words.map(str::to_string).collect())),
            "/skip" | "skip" => Some(Self::Skip),
            "/choice" | "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// Run a command and return the reply text for the operator.
pub async fn execute(orch: &Orchestrator, cmd: OperatorCommand) -> String {
    info!(target: "commands", ?cmd, "operator command");
    match cmd {
        OperatorCommand::Approve(ids) if ids.is_empty() => {
            "Usage: /post <id> [<id> …]  (/choice lists pending ids)".to_string()
        }
        OperatorCommand::Approve(ids) => match orch.queue().approve(&ids) {
            Err(e) => format!("Approval could not be saved, nothing changed: {e}"),
            Ok(approved) if approved.is_empty() => {
                format!("No pending article matched: {}", ids.join(", "))
            }
            Ok(approved) => {
                let results = orch.publish_ids(approved.as_slice()).await;
                publish_reply(&results)
            }
        },
        OperatorCommand::Skip => match orch.queue().skip_all_pending() {
            Err(e) => format!("Skip could not be saved, nothing changed: {e}"),
            Ok(skipped) if skipped.is_empty() => "Nothing pending to skip.".to_string(),
            Ok(skipped) => format!(
                "Skipped {} pending articles: {}",
                skipped.len(),
                skipped.join(", ")
            ),
        },
        OperatorCommand::Status => status_text(orch),
    }
}

pub fn status_text(orch: &Orchestrator) -> String {
    let quota = orch.quota().snapshot();
    let limiter = orch.quota().limiter();
    let header = format!(
        "Posts today: {}/{} ({})",
        quota.count, limiter.max_daily, quota.date
    );
    match messages::pending_summary(&orch.queue().list_pending()) {
        Some(n) => format!("{header}\n\n{}", n.message),
        None => format!("{header}\n\nNo pending articles."),
    }
}

fn publish_reply(results: &[PublishResult]) -> String {
    let mut lines = Vec::with_capacity(results.len());
    for r in results {
        let line = match &r.outcome {
            PublishOutcome::Published { draft } => format!("{}: draft created {}", r.id, draft.edit_url),
            PublishOutcome::AlreadyRecorded => format!("{}: already published", r.id),
            PublishOutcome::InFlight => format!("{}: already being published", r.id),
            PublishOutcome::Failed | PublishOutcome::LedgerFailed { .. } => {
                format!("{}: approved, publish failed; retrying next cycle", r.id)
            }
            PublishOutcome::NotApproved => format!("{}: not approved", r.id),
        };
        lines.push(line);
    }
    lines.join("\n")
}

const POLL_SECS: u64 = 30;

/// Long-poll Telegram and answer commands from the operator chat only.
pub fn spawn_telegram_listener(
    orch: Arc<Orchestrator>,
    client: TelegramClient,
    owner_chat_id: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut offset: i64 = 0;
        info!(target: "commands", "telegram command listener started");
        loop {
            let updates = match client.get_updates(offset, POLL_SECS).await {
                Ok(u) => u,
                Err(e) => {
                    warn!(target: "commands", error = ?e, "telegram getUpdates failed");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };
            for up in updates {
                offset = offset.max(up.update_id + 1);
                let Some(msg) = up.message else { continue };
                if msg.chat.id != owner_chat_id {
                    debug!(target: "commands", chat = msg.chat.id, "ignoring message from non-operator chat");
                    continue;
                }
                let Some(cmd) = msg.text.as_deref().and_then(OperatorCommand::parse) else {
                    continue;
                };
                let reply = execute(&orch, cmd).await;
                if let Err(e) = client.send_text(owner_chat_id, &reply).await {
                    warn!(target: "commands", error = ?e, "telegram reply failed");
                }
            }
        }
    })
}
