// src/review/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generate::GeneratedArticle;
use crate::ingest::types::CandidateItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Pending,
    Approved,
    Skipped,
}

impl ArticleStatus {
    /// Approved and skipped never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ArticleStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArticleStatus::Pending => "pending",
            ArticleStatus::Approved => "approved",
            ArticleStatus::Skipped => "skipped",
        }
    }
}

/// A generated article waiting for (or past) its publish decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingArticle {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub source_item: CandidateItem,
    pub generated_title: String,
    pub generated_content: String,
    pub generated_teaser: String,
    #[serde(default)]
    pub type_tag: String,
    pub status: ArticleStatus,
}

impl PendingArticle {
    pub fn new(
        id: String,
        created_at: DateTime<Utc>,
        source_item: CandidateItem,
        generated: GeneratedArticle,
    ) -> Self {
        Self {
            id,
            created_at,
            source_item,
            generated_title: generated.title,
            generated_content: generated.content,
            generated_teaser: generated.teaser,
            type_tag: generated.type_tag,
            status: ArticleStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ArticleStatus::Pending
    }
}
