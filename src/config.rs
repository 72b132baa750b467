//! Fully merged runtime configuration for one pipeline cycle.
//!
//! Static settings come from the YAML file, secrets from the environment;
//! `load_config` produces these types with both merged. Nothing here reads
//! the environment itself.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

#[derive(Debug)]
pub struct PipelineConfig {
    /// Directory for downloaded/reformatted media; emptied every cycle.
    pub work_dir: PathBuf,
    /// The regenerated operator dashboard.
    pub dashboard_path: PathBuf,
    pub state: StateConfig,
    /// Per-destination daily ceiling for rate-limited destinations.
    pub daily_limit: u32,
    /// Bound applied to every external network call and subprocess.
    pub timeout: Duration,
    /// Sources in priority order: first non-empty wins.
    pub sources: Vec<SourceConfig>,
    pub destinations: Vec<DestinationConfig>,
}

impl PipelineConfig {
    pub fn trace_loaded(&self) {
        info!(
            work_dir = %self.work_dir.display(),
            sources = self.sources.len(),
            destinations = self.destinations.len(),
            daily_limit = self.daily_limit,
            "loaded pipeline config"
        );
    }
}

#[derive(Debug)]
pub struct StateConfig {
    pub processed_ids: PathBuf,
    pub counter_dir: PathBuf,
}

#[derive(Debug)]
pub enum SourceConfig {
    Discord(DiscordSourceConfig),
    Bookmarks(BookmarkSourceConfig),
    DirectMessages(DmSourceConfig),
}

/// Chat-channel link source: scans a Discord channel for clip links.
#[derive(Debug)]
pub struct DiscordSourceConfig {
    pub bot_token: String,
    pub channel_id: String,
    /// Bounded window of recent messages fetched per cycle.
    pub message_limit: u32,
}

/// Bookmark source: cookie-authenticated scan of X bookmarks.
#[derive(Debug)]
pub struct BookmarkSourceConfig {
    pub cookies_path: PathBuf,
    /// Bounded window of recent bookmarks fetched per cycle.
    pub count: u32,
}

/// Direct-message source: cookie-authenticated scan of unread Instagram DMs.
#[derive(Debug)]
pub struct DmSourceConfig {
    pub cookies_path: PathBuf,
}

#[derive(Debug)]
pub enum DestinationConfig {
    YouTube(YouTubeConfig),
    Instagram(InstagramConfig),
}

#[derive(Debug)]
pub struct YouTubeConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// `public`, `unlisted` or `private`.
    pub privacy: String,
}

#[derive(Debug)]
pub struct InstagramConfig {
    pub user_id: String,
    pub access_token: String,
    pub share_to_feed: bool,
    /// Interval between container status polls.
    pub poll_interval: Duration,
    /// Cap on total container processing wait; exceeding it is a failure.
    pub poll_max_wait: Duration,
}
