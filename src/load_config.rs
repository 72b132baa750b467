//! Static YAML config loader with environment-variable secret injection.
//!
//! The YAML file carries no secrets; tokens and cookies-derived credentials
//! come from the environment (or a `.env` file loaded by the caller). A
//! secret is only required if the source or destination that needs it is
//! actually configured.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info};

use crate::config::{
    BookmarkSourceConfig, DestinationConfig, DiscordSourceConfig, DmSourceConfig, InstagramConfig,
    PipelineConfig, SourceConfig, StateConfig, YouTubeConfig,
};

#[derive(Deserialize)]
struct StaticConfig {
    #[serde(default = "default_work_dir")]
    work_dir: PathBuf,
    #[serde(default = "default_dashboard")]
    dashboard: PathBuf,
    state: StateSection,
    #[serde(default = "default_daily_limit")]
    daily_limit: u32,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default)]
    sources: Vec<SourceYaml>,
    #[serde(default)]
    destinations: Vec<DestinationYaml>,
}

#[derive(Deserialize)]
struct StateSection {
    processed_ids: PathBuf,
    counter_dir: PathBuf,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum SourceYaml {
    #[serde(rename = "discord")]
    Discord {
        #[serde(default = "default_message_limit")]
        message_limit: u32,
    },
    #[serde(rename = "bookmarks")]
    Bookmarks {
        cookies: PathBuf,
        #[serde(default = "default_bookmark_count")]
        count: u32,
    },
    #[serde(rename = "dms")]
    DirectMessages { cookies: PathBuf },
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DestinationYaml {
    #[serde(rename = "youtube")]
    YouTube {
        #[serde(default = "default_privacy")]
        privacy: String,
    },
    #[serde(rename = "instagram")]
    Instagram {
        #[serde(default = "default_share_to_feed")]
        share_to_feed: bool,
        #[serde(default = "default_poll_interval_secs")]
        poll_interval_secs: u64,
        #[serde(default = "default_poll_max_wait_secs")]
        poll_max_wait_secs: u64,
    },
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./temp_videos")
}
fn default_dashboard() -> PathBuf {
    PathBuf::from("./DASHBOARD.md")
}
fn default_daily_limit() -> u32 {
    6
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_message_limit() -> u32 {
    50
}
fn default_bookmark_count() -> u32 {
    20
}
fn default_privacy() -> String {
    "unlisted".to_string()
}
fn default_share_to_feed() -> bool {
    true
}
fn default_poll_interval_secs() -> u64 {
    5
}
fn default_poll_max_wait_secs() -> u64 {
    300
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        Ok(_) => {
            error!(var = name, "environment variable set but empty");
            Err(anyhow::anyhow!("{name} environment variable is empty"))
        }
        Err(e) => {
            error!(var = name, error = ?e, "environment variable not set");
            Err(anyhow::anyhow!("{name} environment variable not set: {e}"))
        }
    }
}

/// Loads a static YAML config file (no secrets) and injects required env
/// vars for secrets. Returns a fully merged [`PipelineConfig`] or an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "failed to read config file");
        anyhow::anyhow!("failed to read config file {path_ref:?}: {e}")
    })?;

    let static_conf: StaticConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "failed to parse config YAML");
        anyhow::anyhow!("failed to parse config YAML: {e}")
    })?;

    let mut sources = Vec::new();
    for source in static_conf.sources {
        sources.push(match source {
            SourceYaml::Discord { message_limit } => {
                let bot_token = require_env("DISCORD_BOT_TOKEN")?;
                let channel_id = require_env("DISCORD_CHANNEL_ID")?;
                info!(channel_id = %channel_id, "configured discord source");
                SourceConfig::Discord(DiscordSourceConfig {
                    bot_token,
                    channel_id,
                    message_limit,
                })
            }
            SourceYaml::Bookmarks { cookies, count } => {
                info!(cookies = %cookies.display(), count, "configured bookmark source");
                SourceConfig::Bookmarks(BookmarkSourceConfig {
                    cookies_path: cookies,
                    count,
                })
            }
            SourceYaml::DirectMessages { cookies } => {
                info!(cookies = %cookies.display(), "configured DM source");
                SourceConfig::DirectMessages(DmSourceConfig {
                    cookies_path: cookies,
                })
            }
        });
    }

    let mut destinations = Vec::new();
    for destination in static_conf.destinations {
        destinations.push(match destination {
            DestinationYaml::YouTube { privacy } => {
                let client_id = require_env("YT_CLIENT_ID")?;
                let client_secret = require_env("YT_CLIENT_SECRET")?;
                let refresh_token = require_env("YT_REFRESH_TOKEN")?;
                info!(privacy = %privacy, "configured youtube destination");
                DestinationConfig::YouTube(YouTubeConfig {
                    client_id,
                    client_secret,
                    refresh_token,
                    privacy,
                })
            }
            DestinationYaml::Instagram {
                share_to_feed,
                poll_interval_secs,
                poll_max_wait_secs,
            } => {
                let user_id = require_env("IG_USER_ID")?;
                let access_token = require_env("IG_ACCESS_TOKEN")?;
                info!(share_to_feed, "configured instagram destination");
                DestinationConfig::Instagram(InstagramConfig {
                    user_id,
                    access_token,
                    share_to_feed,
                    poll_interval: Duration::from_secs(poll_interval_secs),
                    poll_max_wait: Duration::from_secs(poll_max_wait_secs),
                })
            }
        });
    }

    let config = PipelineConfig {
        work_dir: static_conf.work_dir,
        dashboard_path: static_conf.dashboard,
        state: StateConfig {
            processed_ids: static_conf.state.processed_ids,
            counter_dir: static_conf.state.counter_dir,
        },
        daily_limit: static_conf.daily_limit,
        timeout: Duration::from_secs(static_conf.timeout_secs),
        sources,
        destinations,
    };
    config.trace_loaded();
    Ok(config)
}
