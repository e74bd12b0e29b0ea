// src/notify/messages.rs

use chrono::{DateTime, Utc};

use super::Notification;
use crate::orchestrator::PublishMode;
use crate::publish::PublishedDraft;
use crate::quota::RateLimiter;
use crate::review::PendingArticle;

fn excerpt(s: &str, max: usize) -> String {
    let plain = strip_tags(s);
    let mut out: String = plain.chars().take(max).collect();
    if plain.chars().count() > max {
        out.push_str("...");
    }
    out
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sent to the operator chat on boot; a failed send means the chat id is wrong.
pub fn startup_message(
    bot: &str,
    mode: PublishMode,
    limits: RateLimiter,
    every: std::time::Duration,
    started: DateTime<Utc>,
) -> Notification {
    let flow = match mode {
        PublishMode::Review => "articles wait for /post or the review timeout",
        PublishMode::Automated => "articles become drafts as soon as they are generated",
    };
    let msg = format!(
        "MATCHDAY DESK STARTED\n\n\
         Bot: {bot}\n\
         Mode: {flow}\n\
         Up to {per_job} articles per cycle, {max_daily} per day\n\
         Cycle every {minutes} minutes\n\
         Started: {started}\n\n\
         /choice lists pending articles.",
        per_job = limits.per_job,
        max_daily = limits.max_daily,
        minutes = every.as_secs() / 60,
        started = started.format("%B %d, %Y at %H:%M UTC"),
    );
    Notification::text(msg)
}

/// Sent once per article entering review.
pub fn review_message(a: &PendingArticle, timeout_minutes: i64) -> Notification {
    let msg = format!(
        "ARTICLE REVIEW #{id}\n\n\
         Title: {title}\n\n\
         Teaser: {teaser}\n\n\
         Content: {content}\n\n\
         Source: {source}\n\
         Type: {kind}\n\n\
         Reply /post {id} to approve, or wait {timeout_minutes} minutes for auto-approval.\n\
         /choice lists everything pending.",
        id = a.id,
        title = a.generated_title,
        teaser = if a.generated_teaser.is_empty() { "-" } else { a.generated_teaser.as_str() },
        content = excerpt(&a.generated_content, 200),
        source = a.source_item.source_name,
        kind = if a.type_tag.is_empty() { "unknown" } else { a.type_tag.as_str() },
    );
    Notification::text(msg)
}

/// One block listing every pending id, in the order given (the queue lists
/// oldest first). `None` when nothing is pending.
pub fn pending_summary(pending: &[PendingArticle]) -> Option<Notification> {
    if pending.is_empty() {
        return None;
    }
    let mut msg = format!("PENDING ARTICLES ({})\n\n", pending.len());
    for a in pending {
        msg.push_str(&format!(
            "{} | {}\n{}\n{}\n\n",
            a.id,
            a.created_at.format("%H:%M"),
            excerpt(&a.generated_title, 50),
            if a.type_tag.is_empty() { "unknown" } else { a.type_tag.as_str() },
        ));
    }
    let all: Vec<&str> = pending.iter().map(|a| a.id.as_str()).collect();
    msg.push_str(&format!(
        "Commands:\n/post {} - approve all\n/post <id> <id> - approve specific\n/skip - skip all pending",
        all.join(" ")
    ));
    Some(Notification::text(msg))
}

/// Sent after a draft was created and the article left the queue.
pub fn published_report(a: &PendingArticle, draft: &PublishedDraft) -> Notification {
    let item = &a.source_item;
    let msg = format!(
        "DRAFT CREATED #{id}\n\n\
         Title: {title}\n\
         Type: {kind}\n\
         Edit: {edit}\n\n\
         Excerpt: {summary}",
        id = a.id,
        title = a.generated_title,
        kind = if a.type_tag.is_empty() { "general" } else { a.type_tag.as_str() },
        edit = draft.edit_url,
        summary = excerpt(&item.summary, 300),
    );
    Notification::text(msg).with_image(item.image_url.clone())
}
