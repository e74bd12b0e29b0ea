// tests/config_env.rs
// Mutates process env and CWD, hence serial.

use std::{env, fs};

use matchday_desk::config::{Credentials, PipelineConfig, ENV_CONFIG_PATH};
use matchday_desk::PublishMode;

const OVERRIDES: &[&str] = &["REVIEW_TIMEOUT_MINUTES", "NEWSROOM_MODE", "NEWSROOM_STATE_DIR"];

const CREDENTIALS: &[&str] = &[
    "GEMINI_API_KEY",
    "BLOG_ID",
    "BLOGGER_ACCESS_TOKEN",
    "TELEGRAM_BOT_TOKEN",
    "OWNER_CHAT_ID",
    "DISCORD_WEBHOOK_URL",
];

fn clear(keys: &[&str]) {
    for k in keys {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn lookup_prefers_env_path_then_local_file_then_defaults() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);
    clear(OVERRIDES);

    // nothing on disk
    let cfg = PipelineConfig::load_default().unwrap();
    assert_eq!(cfg.limits.max_daily, 12);
    assert_eq!(cfg.pipeline.mode, PublishMode::Review);

    // ./config/newsroom.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/newsroom.toml"),
        "[limits]\nmax_daily = 6\nper_job = 2\n",
    )
    .unwrap();
    let cfg = PipelineConfig::load_default().unwrap();
    assert_eq!(cfg.limits.max_daily, 6);
    assert_eq!(cfg.limits.per_job, 2);

    // env path wins
    let p = tmp.path().join("other.toml");
    fs::write(&p, "[pipeline]\nmode = \"automated\"\n[limits]\nmax_daily = 3\nper_job = 9\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, p.display().to_string());
    let cfg = PipelineConfig::load_default().unwrap();
    assert_eq!(cfg.pipeline.mode, PublishMode::Automated);
    assert_eq!(cfg.limits.max_daily, 3);
    assert_eq!(cfg.limits.per_job, 3, "per_job is clamped to max_daily");

    env::remove_var(ENV_CONFIG_PATH);
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn missing_env_path_is_an_error() {
    clear(OVERRIDES);
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/here/newsroom.toml");
    let err = PipelineConfig::load_default().unwrap_err();
    assert!(err.to_string().contains("non-existent"));
    env::remove_var(ENV_CONFIG_PATH);
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_after_the_file() {
    clear(OVERRIDES);
    env::set_var("REVIEW_TIMEOUT_MINUTES", "45");
    env::set_var("NEWSROOM_MODE", "auto");
    env::set_var("NEWSROOM_STATE_DIR", "/var/lib/desk");

    let mut cfg = PipelineConfig::from_toml_str("[pipeline]\nreview_timeout_minutes = 10\n").unwrap();
    cfg.apply_env_overrides().unwrap();
    assert_eq!(cfg.pipeline.review_timeout_minutes, 45);
    assert_eq!(cfg.pipeline.mode, PublishMode::Automated);
    assert_eq!(cfg.pipeline.state_dir, std::path::PathBuf::from("/var/lib/desk"));
    assert_eq!(cfg.cycle_settings().review_timeout, chrono::Duration::minutes(45));

    env::set_var("REVIEW_TIMEOUT_MINUTES", "soon");
    assert!(cfg.apply_env_overrides().is_err());
    clear(OVERRIDES);
}

#[serial_test::serial]
#[test]
fn credentials_require_every_secret_but_discord() {
    clear(CREDENTIALS);
    env::set_var("GEMINI_API_KEY", "g");
    env::set_var("BLOG_ID", "123");
    env::set_var("BLOGGER_ACCESS_TOKEN", "tok");
    env::set_var("TELEGRAM_BOT_TOKEN", "bot");

    let err = Credentials::from_env().unwrap_err();
    assert!(err.to_string().contains("OWNER_CHAT_ID"));

    env::set_var("OWNER_CHAT_ID", "not-a-number");
    assert!(Credentials::from_env().is_err());

    env::set_var("OWNER_CHAT_ID", "-100200");
    let creds = Credentials::from_env().unwrap();
    assert_eq!(creds.owner_chat_id, -100200);
    assert!(creds.discord_webhook_url.is_none());
    assert!(!format!("{creds:?}").contains("tok"));

    clear(CREDENTIALS);
}
