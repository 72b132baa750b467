//! Direct-message source: clips shared to the account's Instagram DMs.
//!
//! Authenticates with browser-exported cookies against the web API and
//! scans unread threads for shared clips, oldest first, skipping messages
//! the account sent itself.
//!
//! Acknowledgement trade-off: the chosen item is marked seen at discovery
//! time, before the pipeline has published anything, because mark-as-seen
//! is the only way to stop the unread filter from resurfacing it forever.
//! If a later publish fails, this item is silently dropped rather than
//! retried. That is deliberate: an infinite reprocessing loop is worse than
//! a rare missed clip on transient publish failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::DmSourceConfig;
use crate::contract::{Candidate, Source};
use crate::error::AdapterError;
use crate::sources::cookies::CookieFile;
use crate::state::StateStore;

const IG_WEB_BASE: &str = "https://www.instagram.com";
const IG_APP_ID: &str = "936619743392459";

/// Desktop Chrome User-Agent; the web API rejects unknown clients.
const WEB_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

struct SharedClip {
    media_pk: String,
    shortcode: String,
    caption: String,
    sender: String,
    timestamp: i64,
    thread_id: String,
    item_id: String,
}

pub struct DmSource {
    http: reqwest::Client,
    config: DmSourceConfig,
    state: Arc<dyn StateStore>,
}

impl DmSource {
    pub fn new(http: reqwest::Client, config: DmSourceConfig, state: Arc<dyn StateStore>) -> Self {
        Self {
            http,
            config,
            state,
        }
    }

    async fn mark_seen(
        &self,
        cookies: &CookieFile,
        csrf: &str,
        thread_id: &str,
        item_id: &str,
    ) -> Result<(), AdapterError> {
        let url = format!("{IG_WEB_BASE}/api/v1/direct_v2/threads/{thread_id}/items/{item_id}/seen/");
        let response = self
            .http
            .post(&url)
            .header("User-Agent", WEB_USER_AGENT)
            .header("x-csrftoken", csrf)
            .header("x-requested-with", "XMLHttpRequest")
            .header("x-instagram-ajax", "1")
            .header("Referer", format!("{IG_WEB_BASE}/direct/inbox/"))
            .header("Cookie", cookies.header_value())
            .form(&[
                ("action", "mark_seen"),
                ("thread_id", thread_id),
                ("item_id", item_id),
                ("use_unified_inbox", "true"),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            info!(thread_id, item_id, "marked DM item as seen");
            Ok(())
        } else {
            Err(AdapterError::Api(format!(
                "mark-as-seen returned HTTP {}",
                response.status()
            )))
        }
    }
}

/// The shared media object of a DM item, if the item is a clip share.
fn shared_media(item: &Value) -> Option<&Value> {
    match item.get("item_type").and_then(Value::as_str)? {
        "clip" => {
            let clip = item.get("clip")?;
            // The payload nests the media one level deeper when present.
            Some(clip.get("clip").unwrap_or(clip))
        }
        "media_share" => item.get("media_share"),
        _ => None,
    }
}

fn media_pk(media: &Value) -> Option<String> {
    let raw = match media.get("pk") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => media.get("id").and_then(Value::as_str)?.to_string(),
    };
    // Composite ids look like `<pk>_<user>`; only the pk part is stable.
    Some(raw.split('_').next().unwrap_or(&raw).to_string())
}

fn media_caption(media: &Value) -> String {
    match media.get("caption") {
        Some(Value::String(s)) => s.clone(),
        Some(obj) => obj
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        None => String::new(),
    }
}

fn collect_clips(threads: &[Value], own_user_id: &str) -> Vec<SharedClip> {
    let mut clips = Vec::new();
    for thread in threads {
        let thread_id = match thread.get("thread_id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        let sender = thread
            .pointer("/users/0/username")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let Some(items) = thread.get("items").and_then(Value::as_array) else {
            continue;
        };
        for item in items {
            let item_user_id = match item.get("user_id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            if !own_user_id.is_empty() && item_user_id == own_user_id {
                debug!(user_id = %item_user_id, "skipping own outgoing message");
                continue;
            }
            let Some(media) = shared_media(item) else {
                continue;
            };
            let Some(pk) = media_pk(media) else {
                continue;
            };
            let shortcode = media
                .get("code")
                .or_else(|| media.get("shortcode"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            if shortcode.is_empty() {
                continue;
            }
            let timestamp = item
                .get("timestamp")
                .and_then(Value::as_i64)
                .unwrap_or_default();
            let item_id = match item.get("item_id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => continue,
            };
            clips.push(SharedClip {
                media_pk: pk,
                shortcode,
                caption: media_caption(media),
                sender: sender.clone(),
                timestamp,
                thread_id: thread_id.clone(),
                item_id,
            });
        }
    }
    clips.sort_by_key(|clip| clip.timestamp);
    clips
}

#[async_trait]
impl Source for DmSource {
    fn name(&self) -> &str {
        "dms"
    }

    async fn discover(&self) -> Result<Option<Candidate>, AdapterError> {
        let cookies = CookieFile::load(&self.config.cookies_path)?;
        cookies.require("sessionid")?;
        let csrf = cookies.require("csrftoken")?.to_string();
        let own_user_id = cookies.get("ds_user_id").unwrap_or("").to_string();
        if own_user_id.is_empty() {
            warn!("no ds_user_id cookie, cannot filter outgoing messages");
        }

        let url = format!("{IG_WEB_BASE}/api/v1/direct_v2/inbox/?selected_filter=unread");
        let response = self
            .http
            .get(&url)
            .header("User-Agent", WEB_USER_AGENT)
            .header("X-CSRFToken", &csrf)
            .header("X-IG-App-ID", IG_APP_ID)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", format!("{IG_WEB_BASE}/direct/inbox/"))
            .header("Accept", "*/*")
            .header("Cookie", cookies.header_value())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Api(format!(
                "inbox fetch returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Decode(format!("inbox payload: {e}")))?;

        let threads = body
            .pointer("/inbox/threads")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if threads.is_empty() {
            info!("no unread DM threads");
            return Ok(None);
        }

        let clips = collect_clips(&threads, &own_user_id);
        if clips.is_empty() {
            info!("no shared clips in unread DMs");
            return Ok(None);
        }
        info!(count = clips.len(), "found shared clips in unread DMs");

        let processed = self.state.load_processed_ids()?;
        let mut unprocessed = clips
            .into_iter()
            .filter(|clip| !processed.contains(&format!("igdm_{}", clip.media_pk)));

        let Some(clip) = unprocessed.next() else {
            info!("all shared clips already processed");
            return Ok(None);
        };
        let queue_behind = unprocessed.count() as u32;

        info!(
            shortcode = %clip.shortcode,
            pk = %clip.media_pk,
            sender = %clip.sender,
            "oldest unread shared clip selected"
        );

        // Mark seen before handing off; if this fails, withhold the
        // candidate so a broken acknowledgement cannot loop forever.
        if let Err(e) = self
            .mark_seen(&cookies, &csrf, &clip.thread_id, &clip.item_id)
            .await
        {
            warn!(error = %e, item_id = %clip.item_id, "mark-as-seen failed, withholding candidate");
            return Ok(None);
        }

        Ok(Some(Candidate {
            id: format!("igdm_{}", clip.media_pk),
            source_uri: format!("{IG_WEB_BASE}/reel/{}/", clip.shortcode),
            caption_text: clip.caption.chars().take(280).collect(),
            author_label: format!("@{}", clip.sender),
            ack: None,
            queue_behind,
        }))
    }

    async fn acknowledge(&self, candidate: &Candidate) -> Result<(), AdapterError> {
        // Already acknowledged at discovery time via mark-as-seen.
        debug!(id = %candidate.id, "DM item was acknowledged at discovery");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clip_item(item_id: &str, user_id: &str, pk: &str, code: &str, ts: i64) -> Value {
        json!({
            "item_id": item_id,
            "user_id": user_id,
            "timestamp": ts,
            "item_type": "clip",
            "clip": {
                "clip": {
                    "pk": pk,
                    "code": code,
                    "caption": {"text": "look at this"},
                    "video_versions": [{"url": "http://cdn/clip.mp4"}]
                }
            }
        })
    }

    #[test]
    fn collects_oldest_first_and_skips_own_messages() {
        let threads = vec![json!({
            "thread_id": "t1",
            "users": [{"username": "friend"}],
            "items": [
                clip_item("i3", "999", "300", "ccc", 30),
                clip_item("i1", "999", "100", "aaa", 10),
                clip_item("i2", "me77", "200", "bbb", 20),
            ]
        })];
        let clips = collect_clips(&threads, "me77");
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].media_pk, "100");
        assert_eq!(clips[1].media_pk, "300");
        assert_eq!(clips[0].sender, "friend");
        assert_eq!(clips[0].caption, "look at this");
    }

    #[test]
    fn composite_media_id_is_trimmed_to_pk() {
        let media = json!({"id": "12345_678", "code": "abc"});
        assert_eq!(media_pk(&media).as_deref(), Some("12345"));
    }

    #[test]
    fn text_items_are_ignored() {
        let threads = vec![json!({
            "thread_id": "t1",
            "users": [{"username": "friend"}],
            "items": [{"item_id": "i1", "user_id": "1", "item_type": "text", "text": "hi"}]
        })];
        assert!(collect_clips(&threads, "").is_empty());
    }
}
