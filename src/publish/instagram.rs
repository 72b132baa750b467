//! Instagram destination: Graph API Reels via resumable upload.
//!
//! This is the asynchronous submit-then-poll destination: create a media
//! container, upload the bytes, poll the container status until the remote
//! processing finishes (bounded by `poll_max_wait`; exceeding it is a
//! failure like any other), then commit with `media_publish`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::InstagramConfig;
use crate::contract::Publisher;
use crate::error::PublishError;
use crate::publish::clamp_chars;

const GRAPH_URL: &str = "https://graph.facebook.com/v21.0";
const RUPLOAD_URL: &str = "https://rupload.facebook.com/ig-api/v21.0/video-upload";

pub struct InstagramPublisher {
    http: reqwest::Client,
    config: InstagramConfig,
}

impl InstagramPublisher {
    pub fn new(http: reqwest::Client, config: InstagramConfig) -> Self {
        Self { http, config }
    }

    async fn create_container(&self, caption: &str) -> Result<(String, Option<String>), PublishError> {
        let share_to_feed = if self.config.share_to_feed { "true" } else { "false" };
        let caption = clamp_chars(caption, 2200);
        let response = self
            .http
            .post(format!("{GRAPH_URL}/{}/media", self.config.user_id))
            .form(&[
                ("media_type", "REELS"),
                ("upload_type", "resumable"),
                ("caption", caption.as_str()),
                ("share_to_feed", share_to_feed),
                ("like_and_view_counts_disabled", "1"),
                ("access_token", self.config.access_token.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!(
                "container creation failed: {body}"
            )));
        }

        let body: Value = response.json().await?;
        let container_id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PublishError::Api("no container id in response".into()))?
            .to_string();
        let upload_uri = body
            .get("uri")
            .and_then(Value::as_str)
            .map(str::to_owned);
        info!(container_id = %container_id, "instagram container created");
        Ok((container_id, upload_uri))
    }

    async fn upload_bytes(
        &self,
        container_id: &str,
        upload_uri: Option<String>,
        file: &Path,
    ) -> Result<(), PublishError> {
        let url = upload_uri.unwrap_or_else(|| format!("{RUPLOAD_URL}/{container_id}"));
        let bytes = tokio::fs::read(file).await?;
        let file_size = bytes.len();
        info!(file_size, "uploading clip bytes to instagram");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("OAuth {}", self.config.access_token))
            .header("offset", "0")
            .header("file_size", file_size.to_string())
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!(
                "file upload failed ({status}): {body}"
            )));
        }
        info!("instagram file upload complete, waiting for processing");
        Ok(())
    }

    async fn wait_until_ready(&self, container_id: &str) -> Result<(), PublishError> {
        let mut elapsed = Duration::ZERO;
        while elapsed < self.config.poll_max_wait {
            sleep(self.config.poll_interval).await;
            elapsed += self.config.poll_interval;

            let response = self
                .http
                .get(format!("{GRAPH_URL}/{container_id}"))
                .query(&[
                    ("fields", "status_code,status"),
                    ("access_token", self.config.access_token.as_str()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(body = %body, "container status check error, retrying");
                continue;
            }

            let status: Value = response.json().await?;
            match status.get("status_code").and_then(Value::as_str) {
                Some("FINISHED") => {
                    info!(container_id = %container_id, "instagram container ready");
                    return Ok(());
                }
                Some("ERROR") => {
                    let detail = status
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    return Err(PublishError::RemoteProcessing(detail.to_string()));
                }
                other => {
                    debug!(status = ?other, elapsed = ?elapsed, "container still processing");
                }
            }
        }
        Err(PublishError::Timeout(self.config.poll_max_wait))
    }

    async fn commit(&self, container_id: &str) -> Result<String, PublishError> {
        let response = self
            .http
            .post(format!("{GRAPH_URL}/{}/media_publish", self.config.user_id))
            .form(&[
                ("creation_id", container_id),
                ("access_token", self.config.access_token.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!("publish failed: {body}")));
        }

        let body: Value = response.json().await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| PublishError::Api("no media id in publish response".into()))
    }

    /// Best effort: hide the like count on the published reel. Never fails
    /// the publish.
    async fn hide_like_count(&self, media_id: &str) {
        let result = self
            .http
            .post(format!("{GRAPH_URL}/{media_id}"))
            .query(&[
                ("like_and_view_counts_disabled", "true"),
                ("access_token", self.config.access_token.as_str()),
            ])
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!(media_id = %media_id, "like count hidden");
            }
            Ok(response) => {
                warn!(media_id = %media_id, status = %response.status(), "failed to hide like count");
            }
            Err(e) => {
                warn!(media_id = %media_id, error = %e, "failed to hide like count");
            }
        }
    }
}

#[async_trait]
impl Publisher for InstagramPublisher {
    fn name(&self) -> &str {
        "instagram"
    }

    fn rate_limited(&self) -> bool {
        false
    }

    async fn publish(
        &self,
        file: &Path,
        _title: &str,
        caption: &str,
    ) -> Result<String, PublishError> {
        let (container_id, upload_uri) = self.create_container(caption).await?;
        self.upload_bytes(&container_id, upload_uri, file).await?;
        self.wait_until_ready(&container_id).await?;
        let media_id = self.commit(&container_id).await?;
        info!(media_id = %media_id, "instagram reel published");
        self.hide_like_count(&media_id).await;
        Ok(media_id)
    }
}
