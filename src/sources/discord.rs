//! Chat-channel link source: a Discord channel used as a drop-box queue.
//!
//! Scans a bounded window of recent messages oldest-first for supported clip
//! links. Acknowledgement deletes the message, so the channel itself acts as
//! the queue; the ProcessedSet check on top is defence in depth against a
//! failed delete.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::DiscordSourceConfig;
use crate::contract::{AckToken, Candidate, Source};
use crate::error::AdapterError;
use crate::state::StateStore;

const DISCORD_API: &str = "https://discord.com/api/v10";

/// Patterns for clip pages the fetch step can resolve: Instagram reels and
/// posts, and X/Twitter status links.
fn url_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)https?://(?:www\.)?instagram\.com/reel/[\w-]+/?").unwrap(),
            Regex::new(r"(?i)https?://(?:www\.)?instagram\.com/p/[\w-]+/?").unwrap(),
            Regex::new(r"(?i)https?://(?:www\.)?(?:twitter|x)\.com/\w+/status/\d+").unwrap(),
        ]
    })
}

/// Extract the first supported clip URL from free text.
pub fn extract_clip_url(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    url_patterns()
        .iter()
        .find_map(|pattern| pattern.find(text))
        .map(|m| m.as_str().to_string())
}

#[derive(Deserialize)]
struct Message {
    id: String,
    #[serde(default)]
    content: String,
    author: Author,
    #[serde(default)]
    embeds: Vec<Embed>,
}

#[derive(Deserialize)]
struct Author {
    #[serde(default)]
    username: String,
}

#[derive(Deserialize)]
struct Embed {
    #[serde(default)]
    url: Option<String>,
}

impl Message {
    fn clip_url(&self) -> Option<String> {
        extract_clip_url(&self.content).or_else(|| {
            self.embeds
                .iter()
                .filter_map(|e| e.url.as_deref())
                .find_map(extract_clip_url)
        })
    }
}

pub struct DiscordSource {
    http: reqwest::Client,
    config: DiscordSourceConfig,
    state: Arc<dyn StateStore>,
}

impl DiscordSource {
    pub fn new(
        http: reqwest::Client,
        config: DiscordSourceConfig,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            http,
            config,
            state,
        }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.config.bot_token)
    }
}

#[async_trait]
impl Source for DiscordSource {
    fn name(&self) -> &str {
        "discord"
    }

    async fn discover(&self) -> Result<Option<Candidate>, AdapterError> {
        let url = format!(
            "{DISCORD_API}/channels/{}/messages",
            self.config.channel_id
        );
        let response = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .query(&[("limit", self.config.message_limit)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Api(format!(
                "message fetch returned HTTP {}",
                response.status()
            )));
        }

        let messages: Vec<Message> = response
            .json()
            .await
            .map_err(|e| AdapterError::Decode(format!("message list: {e}")))?;

        if messages.is_empty() {
            info!("channel is empty, no messages");
            return Ok(None);
        }
        info!(count = messages.len(), "fetched channel messages");

        let processed = self.state.load_processed_ids()?;

        // The API returns newest first; drain the queue oldest first.
        let mut eligible = messages
            .iter()
            .rev()
            .filter_map(|msg| {
                let id = format!("discord_{}", msg.id);
                if processed.contains(&id) {
                    debug!(%id, "skipping already-processed message");
                    return None;
                }
                msg.clip_url().map(|url| (msg, id, url))
            })
            .collect::<Vec<_>>()
            .into_iter();

        let Some((message, id, clip_url)) = eligible.next() else {
            info!("no clip links found in any message");
            return Ok(None);
        };
        let queue_behind = eligible.count() as u32;

        info!(
            %id,
            url = %clip_url,
            author = %message.author.username,
            "found clip link in channel"
        );

        Ok(Some(Candidate {
            id,
            source_uri: clip_url,
            caption_text: message.content.chars().take(280).collect(),
            author_label: format!("@{}", message.author.username),
            ack: Some(AckToken(message.id.clone())),
            queue_behind,
        }))
    }

    async fn acknowledge(&self, candidate: &Candidate) -> Result<(), AdapterError> {
        let Some(AckToken(message_id)) = &candidate.ack else {
            return Ok(());
        };
        let url = format!(
            "{DISCORD_API}/channels/{}/messages/{message_id}",
            self.config.channel_id
        );
        let response = self
            .http
            .delete(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        if response.status().as_u16() == 204 {
            info!(message_id = %message_id, "deleted handled message from channel");
            Ok(())
        } else {
            Err(AdapterError::Api(format!(
                "message delete returned HTTP {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_reel_and_status_links() {
        assert_eq!(
            extract_clip_url("watch this https://www.instagram.com/reel/aBc-123/ now"),
            Some("https://www.instagram.com/reel/aBc-123/".to_string())
        );
        assert_eq!(
            extract_clip_url("https://x.com/user/status/123456789"),
            Some("https://x.com/user/status/123456789".to_string())
        );
        assert_eq!(
            extract_clip_url("HTTPS://TWITTER.COM/a/status/1"),
            Some("HTTPS://TWITTER.COM/a/status/1".to_string())
        );
    }

    #[test]
    fn ignores_unrelated_text() {
        assert_eq!(extract_clip_url("no links here"), None);
        assert_eq!(extract_clip_url(""), None);
        assert_eq!(extract_clip_url("https://example.com/reel/x"), None);
    }

    #[test]
    fn falls_back_to_embed_urls() {
        let message = Message {
            id: "1".into(),
            content: "look at this".into(),
            author: Author {
                username: "poster".into(),
            },
            embeds: vec![Embed {
                url: Some("https://instagram.com/p/xyz/".into()),
            }],
        };
        assert_eq!(
            message.clip_url(),
            Some("https://instagram.com/p/xyz/".to_string())
        );
    }
}
