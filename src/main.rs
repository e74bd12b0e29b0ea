//! matchday-desk: binary entrypoint.
//! Boots the operator HTTP API, the cycle scheduler and the Telegram command
//! listener on the Shuttle runtime.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use matchday_desk::{
    api, app, clock, commands,
    config::{Credentials, PipelineConfig},
    metrics::Metrics,
    notify::{messages, TelegramClient},
    scheduler,
};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - NEWSROOM_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("NEWSROOM_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cycle=info,review=info,publish=info,commands=info,warn"));

    // the runtime may already own the global subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = PipelineConfig::load_default()?;
    let creds = Credentials::from_env()?;
    tracing::info!(mode = ?cfg.pipeline.mode, state_dir = %cfg.pipeline.state_dir.display(), "config loaded");

    let metrics = Metrics::init(cfg.rate_limiter())?;

    // a bad bot token or owner chat id should stop the deploy, not the first cycle
    let telegram = TelegramClient::new(creds.telegram_bot_token.clone());
    let me = telegram
        .get_me()
        .await
        .context("telegram getMe failed; check TELEGRAM_BOT_TOKEN")?;
    tracing::info!(bot = %me.handle(), "telegram bot logged in");

    let clock = clock::system();
    let hello = messages::startup_message(
        &me.handle(),
        cfg.pipeline.mode,
        cfg.rate_limiter(),
        cfg.cycle_interval(),
        clock.now(),
    );
    telegram
        .send_text(creds.owner_chat_id, &hello.message)
        .await
        .context("startup message not delivered; check OWNER_CHAT_ID")?;
    tracing::info!("startup message sent to owner");

    let collab = app::production_collaborators(&cfg, &creds, &clock)?;
    let orch = Arc::new(app::build_orchestrator(&cfg, collab, clock)?);

    scheduler::spawn_cycle_scheduler(orch.clone(), cfg.cycle_interval());
    commands::spawn_telegram_listener(orch.clone(), telegram, creds.owner_chat_id);

    let router = api::router(orch).merge(metrics.router());
    Ok(router.into())
}
