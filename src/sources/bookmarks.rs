//! Bookmark source: video tweets saved to the account's X bookmarks.
//!
//! Authenticates with browser-exported cookies against the web GraphQL API.
//! Bookmarks have no cheap transport-level acknowledgement, so dedup relies
//! entirely on the ProcessedSet; bookmarks without a video are recorded as
//! processed up front so they are not re-inspected every cycle.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::BookmarkSourceConfig;
use crate::contract::{Candidate, Source};
use crate::error::AdapterError;
use crate::sources::cookies::CookieFile;
use crate::state::StateStore;

const BOOKMARKS_URL: &str = "https://x.com/i/api/graphql/tmd4ifV8RHltzn8ymGg1aw/Bookmarks";

/// Public bearer token of the X web client; user auth comes from cookies.
const WEB_BEARER: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

const GRAPHQL_FEATURES: &str = r#"{"graphql_timeline_v2_bookmark_timeline":true,"responsive_web_graphql_exclude_directive_enabled":true,"verified_phone_label_enabled":false,"responsive_web_graphql_timeline_navigation_enabled":true,"responsive_web_graphql_skip_user_profile_image_extensions_enabled":false,"tweet_awards_web_tipping_enabled":false,"longform_notetweets_consumption_enabled":true,"responsive_web_twitter_article_tweet_consumption_enabled":false,"tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled":true,"freedom_of_speech_not_reach_fetch_enabled":true,"standardized_nudges_misinfo":true,"longform_notetweets_rich_text_read_enabled":true,"longform_notetweets_inline_media_enabled":true,"responsive_web_media_download_video_enabled":false,"responsive_web_enhance_cards_enabled":false}"#;

/// One bookmarked video tweet, oldest-first ordering handled by the caller.
struct VideoBookmark {
    tweet_id: String,
    video_url: String,
    text: String,
    author: String,
}

pub struct BookmarkSource {
    http: reqwest::Client,
    config: BookmarkSourceConfig,
    state: Arc<dyn StateStore>,
}

impl BookmarkSource {
    pub fn new(
        http: reqwest::Client,
        config: BookmarkSourceConfig,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            http,
            config,
            state,
        }
    }
}

/// Pull the tweet object out of a timeline entry, unwrapping the visibility
/// wrapper variant when present.
fn tweet_result(entry: &Value) -> Option<&Value> {
    let result = entry
        .pointer("/content/itemContent/tweet_results/result")?;
    match result.get("__typename").and_then(Value::as_str) {
        Some("TweetWithVisibilityResults") => result.get("tweet"),
        _ => Some(result),
    }
}

/// Highest-bitrate mp4 variant of the tweet's video, if it has one.
fn best_video_url(tweet: &Value) -> Option<String> {
    let media = tweet
        .pointer("/legacy/extended_entities/media")?
        .as_array()?;
    for item in media {
        let kind = item.get("type").and_then(Value::as_str).unwrap_or("");
        if kind != "video" && kind != "animated_gif" {
            continue;
        }
        let variants = item
            .pointer("/video_info/variants")
            .and_then(Value::as_array)?;
        let mp4s: Vec<&Value> = variants
            .iter()
            .filter(|v| {
                v.get("content_type")
                    .and_then(Value::as_str)
                    .is_some_and(|ct| ct.contains("video/mp4"))
            })
            .collect();
        // Playlists only? Fall back to whatever is there.
        let pool: Vec<&Value> = if mp4s.is_empty() {
            variants.iter().collect()
        } else {
            mp4s
        };
        let best = pool.into_iter().max_by_key(|v| {
            v.get("bitrate").and_then(Value::as_u64).unwrap_or(0)
        })?;
        if let Some(url) = best.get("url").and_then(Value::as_str) {
            return Some(url.to_string());
        }
    }
    None
}

fn screen_name(tweet: &Value) -> String {
    tweet
        .pointer("/core/user_results/result/legacy/screen_name")
        .and_then(Value::as_str)
        .map(|name| format!("@{name}"))
        .unwrap_or_else(|| "unknown".to_string())
}

fn timeline_entries(body: &Value) -> Vec<&Value> {
    let Some(instructions) = body
        .pointer("/data/bookmark_timeline_v2/timeline/instructions")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    instructions
        .iter()
        .filter(|i| i.get("type").and_then(Value::as_str) == Some("TimelineAddEntries"))
        .filter_map(|i| i.get("entries").and_then(Value::as_array))
        .flatten()
        .filter(|entry| {
            entry
                .get("entryId")
                .and_then(Value::as_str)
                .is_some_and(|id| id.starts_with("tweet-"))
        })
        .collect()
}

#[async_trait]
impl Source for BookmarkSource {
    fn name(&self) -> &str {
        "bookmarks"
    }

    async fn discover(&self) -> Result<Option<Candidate>, AdapterError> {
        let cookies = CookieFile::load(&self.config.cookies_path)?;
        let csrf = cookies.require("ct0")?.to_string();

        let variables = format!(
            r#"{{"count":{},"includePromotedContent":false}}"#,
            self.config.count
        );
        let response = self
            .http
            .get(BOOKMARKS_URL)
            .header("Authorization", format!("Bearer {WEB_BEARER}"))
            .header("x-csrf-token", csrf)
            .header("Cookie", cookies.header_value())
            .query(&[("variables", variables.as_str()), ("features", GRAPHQL_FEATURES)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Api(format!(
                "bookmark fetch returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Decode(format!("bookmark timeline: {e}")))?;

        let entries = timeline_entries(&body);
        info!(count = entries.len(), "fetched bookmarks");

        let processed = self.state.load_processed_ids()?;
        let mut videos: Vec<VideoBookmark> = Vec::new();

        for entry in entries {
            let Some(tweet) = tweet_result(entry) else {
                continue;
            };
            let Some(rest_id) = tweet.get("rest_id").and_then(Value::as_str) else {
                continue;
            };
            let id = format!("x_{rest_id}");
            if processed.contains(&id) {
                debug!(%id, "skipping already-processed bookmark");
                continue;
            }
            match best_video_url(tweet) {
                Some(video_url) => {
                    let text = tweet
                        .pointer("/legacy/full_text")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .chars()
                        .take(280)
                        .collect();
                    videos.push(VideoBookmark {
                        tweet_id: id,
                        video_url,
                        text,
                        author: screen_name(tweet),
                    });
                }
                None => {
                    // Never a candidate; record it so the next cycle does
                    // not inspect it again.
                    debug!(%id, "bookmark has no video, marking processed");
                    self.state.record_processed(&id)?;
                }
            }
        }

        // The timeline is newest first; drain oldest first.
        let Some(oldest) = videos.pop() else {
            info!("no unprocessed video bookmarks");
            return Ok(None);
        };
        let queue_behind = videos.len() as u32;
        info!(
            id = %oldest.tweet_id,
            author = %oldest.author,
            queue_behind,
            "selected oldest unprocessed video bookmark"
        );

        Ok(Some(Candidate {
            id: oldest.tweet_id,
            source_uri: oldest.video_url,
            caption_text: oldest.text,
            author_label: oldest.author,
            ack: None,
            queue_behind,
        }))
    }

    async fn acknowledge(&self, candidate: &Candidate) -> Result<(), AdapterError> {
        // Bookmarks stay bookmarked; the ProcessedSet is the only dedup.
        debug!(id = %candidate.id, "bookmark source has no transport acknowledgement");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_highest_bitrate_mp4_variant() {
        let tweet = json!({
            "legacy": {
                "extended_entities": {
                    "media": [{
                        "type": "video",
                        "video_info": {
                            "variants": [
                                {"content_type": "application/x-mpegURL", "url": "http://v/playlist.m3u8"},
                                {"content_type": "video/mp4", "bitrate": 832000, "url": "http://v/low.mp4"},
                                {"content_type": "video/mp4", "bitrate": 2176000, "url": "http://v/high.mp4"}
                            ]
                        }
                    }]
                }
            }
        });
        assert_eq!(best_video_url(&tweet).as_deref(), Some("http://v/high.mp4"));
    }

    #[test]
    fn photo_tweets_have_no_video() {
        let tweet = json!({
            "legacy": {
                "extended_entities": {
                    "media": [{"type": "photo"}]
                }
            }
        });
        assert_eq!(best_video_url(&tweet), None);
        assert_eq!(best_video_url(&json!({"legacy": {}})), None);
    }

    #[test]
    fn unwraps_visibility_results_wrapper() {
        let entry = json!({
            "content": {
                "itemContent": {
                    "tweet_results": {
                        "result": {
                            "__typename": "TweetWithVisibilityResults",
                            "tweet": {"rest_id": "42"}
                        }
                    }
                }
            }
        });
        let tweet = tweet_result(&entry).unwrap();
        assert_eq!(tweet.get("rest_id").and_then(Value::as_str), Some("42"));
    }
}
