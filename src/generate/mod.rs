// src/generate/mod.rs
//! Article generation: provider abstraction + Gemini client + static stub.
//!
//! Generation is fallible and opaque. Every failure (transport, non-2xx,
//! malformed reply) is `None`; callers never see a provider error.

pub mod prompt;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::types::CandidateItem;

/// What the generator hands back for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    /// HTML body.
    pub content: String,
    pub teaser: String,
    pub type_tag: String,
}

#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, item: &CandidateItem) -> Option<GeneratedArticle>;
    fn name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn Generator>;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Gemini `generateContent` client. Requires an API key.
pub struct GeminiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, model_override: Option<&str>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("matchday-desk/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model_override.unwrap_or(DEFAULT_GEMINI_MODEL).to_string(),
            base_url: GEMINI_BASE.to_string(),
        })
    }

    /// Point at a different host (local mock server).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}
#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Req<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}
#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}
#[derive(Deserialize)]
struct Candidate {
    content: Option<RespContent>,
}
#[derive(Deserialize)]
struct RespContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}
#[derive(Deserialize)]
struct RespPart {
    #[serde(default)]
    text: String,
}

#[async_trait::async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, item: &CandidateItem) -> Option<GeneratedArticle> {
        if self.api_key.is_empty() {
            return None;
        }
        let prompt_text = prompt::build_prompt(item);
        let req = Req {
            contents: vec![Content {
                parts: vec![Part { text: &prompt_text }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.9,
                max_output_tokens: 4096,
            },
        };
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let resp = match self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: "generate", error = %e, "gemini request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(target: "generate", status = %resp.status(), "gemini non-2xx");
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        let text: String = body
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        let out = parse_article_reply(&text, item);
        if out.is_none() {
            tracing::warn!(target: "generate", title = %item.title, "gemini reply had no usable article JSON");
        }
        out
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Shape the model is asked to answer with. Older prompts used
/// `telegram_teaser` / `article_type`, so both spellings are accepted.
#[derive(Debug, Deserialize)]
struct ArticleReply {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default, alias = "telegram_teaser")]
    teaser: String,
    #[serde(default, alias = "article_type")]
    type_tag: String,
}

/// Slice from the first `{` to the last `}`; models like to wrap JSON in prose or fences.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a model reply into an article; title and content are mandatory.
pub fn parse_article_reply(text: &str, item: &CandidateItem) -> Option<GeneratedArticle> {
    let raw: ArticleReply = serde_json::from_str(extract_json_object(text)?).ok()?;
    let title = raw.title.trim().to_string();
    let content = raw.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return None;
    }
    let type_tag = match raw.type_tag.trim() {
        "" => prompt::content_angle(item).to_string(),
        t => t.to_string(),
    };
    Some(GeneratedArticle {
        title,
        content,
        teaser: sanitize_teaser(&raw.teaser),
        type_tag,
    })
}

/// Single line, collapsed whitespace, at most 280 chars.
pub fn sanitize_teaser(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(280).collect()
}

/// Deterministic generator: echoes the candidate. Used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticGenerator;

#[async_trait::async_trait]
impl Generator for StaticGenerator {
    async fn generate(&self, item: &CandidateItem) -> Option<GeneratedArticle> {
        Some(GeneratedArticle {
            title: item.title.clone(),
            content: format!(
                "<p>{}</p>",
                html_escape::encode_text(&item.summary)
            ),
            teaser: sanitize_teaser(&item.summary),
            type_tag: prompt::content_angle(item).to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Always `None`; stands in for a broken provider.
#[derive(Debug, Clone, Default)]
pub struct FailingGenerator;

#[async_trait::async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _item: &CandidateItem) -> Option<GeneratedArticle> {
        None
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
