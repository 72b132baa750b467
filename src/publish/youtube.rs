//! YouTube destination: Data API v3 resumable upload.
//!
//! Three steps: exchange the long-lived refresh token for an access token,
//! initiate a resumable upload session, then PUT the file bytes. YouTube is
//! the rate-limited destination, so it is subject to the daily quota gate.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::config::YouTubeConfig;
use crate::contract::Publisher;
use crate::error::PublishError;
use crate::publish::clamp_chars;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

// "People & Blogs"
const CATEGORY_ID: &str = "22";

pub struct YouTubePublisher {
    http: reqwest::Client,
    config: YouTubeConfig,
}

impl YouTubePublisher {
    pub fn new(http: reqwest::Client, config: YouTubeConfig) -> Self {
        Self { http, config }
    }

    async fn access_token(&self) -> Result<String, PublishError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Credentials(format!(
                "token refresh failed: {body}"
            )));
        }

        let body: Value = response.json().await?;
        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| PublishError::Credentials("no access_token in token response".into()))
    }
}

#[async_trait]
impl Publisher for YouTubePublisher {
    fn name(&self) -> &str {
        "youtube"
    }

    fn rate_limited(&self) -> bool {
        true
    }

    async fn publish(
        &self,
        file: &Path,
        title: &str,
        caption: &str,
    ) -> Result<String, PublishError> {
        let access_token = self.access_token().await?;
        info!("youtube access token obtained");

        let file_size = std::fs::metadata(file)?.len();
        let metadata = json!({
            "snippet": {
                "title": clamp_chars(title, 100),
                "description": clamp_chars(caption, 5000),
                "tags": [],
                "categoryId": CATEGORY_ID,
            },
            "status": {
                "privacyStatus": self.config.privacy,
                "selfDeclaredMadeForKids": false,
            },
        });

        let init = self
            .http
            .post(format!(
                "{UPLOAD_URL}?uploadType=resumable&part=snippet,status"
            ))
            .header("Authorization", format!("Bearer {access_token}"))
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(&metadata)
            .send()
            .await?;

        if !init.status().is_success() {
            let body = init.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!("upload init failed: {body}")));
        }

        let session_url = init
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| PublishError::Api("no upload URL in init response".into()))?;
        info!("youtube resumable upload initiated");

        let bytes = tokio::fs::read(file).await?;
        let upload = self
            .http
            .put(&session_url)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Content-Type", "video/*")
            .body(bytes)
            .send()
            .await?;

        if !upload.status().is_success() {
            let body = upload.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!("file upload failed: {body}")));
        }

        let body: Value = upload.json().await?;
        let video_id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PublishError::Api("no video id in upload response".into()))?
            .to_string();

        info!(video_id = %video_id, "youtube upload complete");
        Ok(video_id)
    }
}
