// src/lib.rs
// Public library surface for both binaries and the integration tests.

pub mod clock;
pub mod config;
pub mod store;

// Pipeline stages
pub mod generate;
pub mod ingest;
pub mod ledger;
pub mod publish;
pub mod quota;
pub mod review;
pub mod selector;

// Orchestration and operator surface
pub mod api;
pub mod app;
pub mod commands;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::orchestrator::{CycleError, CycleReport, Orchestrator, PublishMode};
pub use crate::review::{ArticleStatus, PendingArticle, ReviewQueue};
