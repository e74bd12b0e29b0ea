//! Run a single pipeline cycle and exit (cron / CI mode).
//!
//! `run-once`            live collaborators, credentials from env
//! `run-once --dry-run`  live feeds only; nothing is generated remotely,
//!                       published or sent

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use matchday_desk::{
    app, clock,
    config::{Credentials, PipelineConfig},
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let dry_run = std::env::args().skip(1).any(|a| a == "--dry-run");
    let cfg = PipelineConfig::load_default()?;
    let clock = clock::system();

    let collab = if dry_run {
        tracing::warn!("dry run: drafts and notifications stay local");
        app::dry_run_collaborators(&cfg, &clock)?
    } else {
        let creds = Credentials::from_env()?;
        app::production_collaborators(&cfg, &creds, &clock)?
    };
    let orch = app::build_orchestrator(&cfg, collab, clock)?;

    let report = orch.run_cycle().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
