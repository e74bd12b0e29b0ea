// src/publish/mod.rs
//! Draft publishing. A `Publisher` turns an approved article into a blog
//! draft; failure is `None` and the caller keeps the article for retry.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::review::PendingArticle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRequest {
    pub title: String,
    pub content: String,
    pub labels: Vec<String>,
    pub image_url: Option<String>,
    pub image_alt: Option<String>,
    pub image_source: Option<String>,
}

impl DraftRequest {
    /// Drafts carry the generated title; the source headline is only context.
    pub fn from_article(article: &PendingArticle, base_labels: &[String]) -> Self {
        let mut labels: Vec<String> = base_labels.to_vec();
        if !article.type_tag.is_empty() && !labels.iter().any(|l| l == &article.type_tag) {
            labels.push(article.type_tag.clone());
        }
        let item = &article.source_item;
        Self {
            title: article.generated_title.clone(),
            content: article.generated_content.clone(),
            labels,
            image_url: item.image_url.clone(),
            image_alt: item.image_alt.clone().or_else(|| Some(item.title.clone())),
            image_source: Some(item.source_name.clone()),
        }
    }

    /// Content with the cover image block prepended, if there is one.
    pub fn body_html(&self) -> String {
        match &self.image_url {
            Some(url) => format!("{}\n{}", cover_image_html(url, self), self.content),
            None => self.content.clone(),
        }
    }
}

fn cover_image_html(url: &str, req: &DraftRequest) -> String {
    let alt = html_escape::encode_double_quoted_attribute(req.image_alt.as_deref().unwrap_or(""));
    let src = html_escape::encode_double_quoted_attribute(url);
    let credit = req
        .image_source
        .as_deref()
        .map(|s| {
            format!(
                "<figcaption style=\"font-size:0.8em;color:#666\">Image: {}</figcaption>",
                html_escape::encode_text(s)
            )
        })
        .unwrap_or_default();
    format!(
        "<figure style=\"text-align:center;margin:0 0 1.5em\"><img src=\"{src}\" alt=\"{alt}\" style=\"max-width:100%;height:auto\"/>{credit}</figure>"
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedDraft {
    pub post_id: String,
    pub edit_url: String,
}

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, req: &DraftRequest) -> Option<PublishedDraft>;
    fn name(&self) -> &'static str;
}

pub type DynPublisher = Arc<dyn Publisher>;

const BLOGGER_API: &str = "https://www.googleapis.com/blogger/v3";

/// Blogger v3 `posts.insert` as a draft.
pub struct BloggerPublisher {
    http: reqwest::Client,
    blog_id: String,
    access_token: String,
    api_base: String,
}

impl BloggerPublisher {
    pub fn new(blog_id: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("matchday-desk/0.1")
            .timeout(Duration::from_secs(30))
            .build()
            .context("build blogger client")?;
        Ok(Self {
            http,
            blog_id: blog_id.into(),
            access_token: access_token.into(),
            api_base: BLOGGER_API.to_string(),
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn edit_url(&self, post_id: &str) -> String {
        format!(
            "https://www.blogger.com/blog/post/edit/{}/{}",
            self.blog_id, post_id
        )
    }

    async fn insert_draft(&self, req: &DraftRequest) -> Result<PublishedDraft> {
        #[derive(Serialize)]
        struct Body<'a> {
            kind: &'static str,
            title: &'a str,
            content: String,
            labels: &'a [String],
        }
        #[derive(Deserialize)]
        struct Created {
            id: String,
        }

        let url = format!("{}/blogs/{}/posts", self.api_base, self.blog_id);
        let created: Created = self
            .http
            .post(&url)
            .query(&[("isDraft", "true")])
            .bearer_auth(&self.access_token)
            .json(&Body {
                kind: "blogger#post",
                title: &req.title,
                content: req.body_html(),
                labels: &req.labels,
            })
            .send()
            .await
            .context("blogger post")?
            .error_for_status()
            .context("blogger non-2xx")?
            .json()
            .await
            .context("blogger response body")?;

        Ok(PublishedDraft {
            edit_url: self.edit_url(&created.id),
            post_id: created.id,
        })
    }
}

#[async_trait::async_trait]
impl Publisher for BloggerPublisher {
    async fn publish(&self, req: &DraftRequest) -> Option<PublishedDraft> {
        match self.insert_draft(req).await {
            Ok(d) => {
                tracing::info!(target: "publish", post_id = %d.post_id, title = %req.title, "draft created");
                Some(d)
            }
            Err(e) => {
                tracing::warn!(target: "publish", error = ?e, title = %req.title, "draft creation failed");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "blogger"
    }
}

/// Records requests and fabricates ids. Can be told to fail.
#[derive(Default)]
pub struct DryRunPublisher {
    seq: AtomicU64,
    fail: std::sync::atomic::AtomicBool,
    sent: Mutex<Vec<DraftRequest>>,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<DraftRequest> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, req: &DraftRequest) -> Option<PublishedDraft> {
        if self.fail.load(Ordering::SeqCst) {
            return None;
        }
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(req.clone());
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(target: "publish", title = %req.title, "dry run: draft not sent");
        Some(PublishedDraft {
            post_id: format!("dry-{n}"),
            edit_url: format!("dry-run://draft/{n}"),
        })
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
