use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;

use serial_test::serial;
use tempfile::NamedTempFile;

use clip_relay::config::{DestinationConfig, SourceConfig};
use clip_relay::load_config::load_config;

fn clear_secret_env() {
    for var in [
        "DISCORD_BOT_TOKEN",
        "DISCORD_CHANNEL_ID",
        "YT_CLIENT_ID",
        "YT_CLIENT_SECRET",
        "YT_REFRESH_TOKEN",
        "IG_USER_ID",
        "IG_ACCESS_TOKEN",
    ] {
        env::remove_var(var);
    }
}

/// A static config plus required env vars produces a fully merged
/// PipelineConfig, with secrets coming only from the environment.
#[tokio::test]
#[serial]
async fn test_load_config_success_injects_env_secrets() {
    let config_yaml = r#"
work_dir: ./tmp/videos
dashboard: ./tmp/DASHBOARD.md
state:
  processed_ids: ./tmp/processed_ids.txt
  counter_dir: ./tmp
daily_limit: 4
timeout_secs: 90
sources:
  - type: discord
    message_limit: 25
  - type: bookmarks
    cookies: ./cookies.json
destinations:
  - type: youtube
    privacy: public
  - type: instagram
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    clear_secret_env();
    env::set_var("DISCORD_BOT_TOKEN", "bot-token-test");
    env::set_var("DISCORD_CHANNEL_ID", "123456789");
    env::set_var("YT_CLIENT_ID", "yt-client");
    env::set_var("YT_CLIENT_SECRET", "yt-secret");
    env::set_var("YT_REFRESH_TOKEN", "yt-refresh");
    env::set_var("IG_USER_ID", "17841400000000000");
    env::set_var("IG_ACCESS_TOKEN", "ig-token");

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.work_dir, PathBuf::from("./tmp/videos"));
    assert_eq!(config.daily_limit, 4);
    assert_eq!(config.timeout, Duration::from_secs(90));
    assert_eq!(config.state.processed_ids, PathBuf::from("./tmp/processed_ids.txt"));

    assert_eq!(config.sources.len(), 2);
    let discord = match &config.sources[0] {
        SourceConfig::Discord(c) => c,
        other => panic!("expected discord source first, got {other:?}"),
    };
    assert_eq!(discord.bot_token, "bot-token-test");
    assert_eq!(discord.channel_id, "123456789");
    assert_eq!(discord.message_limit, 25);
    let bookmarks = match &config.sources[1] {
        SourceConfig::Bookmarks(c) => c,
        other => panic!("expected bookmark source second, got {other:?}"),
    };
    assert_eq!(bookmarks.cookies_path, PathBuf::from("./cookies.json"));
    assert_eq!(bookmarks.count, 20); // default

    assert_eq!(config.destinations.len(), 2);
    let youtube = match &config.destinations[0] {
        DestinationConfig::YouTube(c) => c,
        other => panic!("expected youtube destination first, got {other:?}"),
    };
    assert_eq!(youtube.privacy, "public");
    assert_eq!(youtube.refresh_token, "yt-refresh");
    let instagram = match &config.destinations[1] {
        DestinationConfig::Instagram(c) => c,
        other => panic!("expected instagram destination second, got {other:?}"),
    };
    assert_eq!(instagram.user_id, "17841400000000000");
    assert!(instagram.share_to_feed); // default
    assert_eq!(instagram.poll_interval, Duration::from_secs(5));
    assert_eq!(instagram.poll_max_wait, Duration::from_secs(300));
}

/// A secret is only required when the source or destination that needs it
/// is configured: a bookmarks-plus-instagram config must not ask for
/// Discord or YouTube credentials.
#[tokio::test]
#[serial]
async fn test_load_config_only_requires_configured_secrets() {
    let config_yaml = r#"
state:
  processed_ids: ./state/processed_ids.txt
  counter_dir: ./state
sources:
  - type: dms
    cookies: ./ig_cookies.json
destinations:
  - type: instagram
    share_to_feed: false
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    clear_secret_env();
    env::set_var("IG_USER_ID", "17841400000000000");
    env::set_var("IG_ACCESS_TOKEN", "ig-token");

    let config = load_config(config_file.path()).expect("Config should load");
    assert_eq!(config.sources.len(), 1);
    assert_eq!(config.destinations.len(), 1);
    // Defaults apply when the YAML omits them.
    assert_eq!(config.daily_limit, 6);
    assert_eq!(config.work_dir, PathBuf::from("./temp_videos"));
    assert_eq!(config.dashboard_path, PathBuf::from("./DASHBOARD.md"));
}

/// Missing required env vars make the loader fail with the var name in the
/// message.
#[tokio::test]
#[serial]
async fn test_load_config_errors_on_missing_env() {
    let config_yaml = r#"
state:
  processed_ids: ./state/processed_ids.txt
  counter_dir: ./state
destinations:
  - type: youtube
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    clear_secret_env();

    let err = load_config(config_file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("YT_CLIENT_ID"),
        "Must error for missing env var, got: {msg}"
    );
}

/// If the config file is not valid YAML, load_config errors and reports it.
#[tokio::test]
#[serial]
async fn test_load_config_errors_for_invalid_file() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"not-yaml: [:::").unwrap();

    let err = load_config(config_file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}
