//! Media download and vertical reformat, shelling out to `yt-dlp` and
//! `ffmpeg`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::contract::{Fetcher, Transformer};
use crate::error::{FetchError, TransformError};

const MEDIA_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "webm", "mov", "avi"];

/// Downloads candidate media with `yt-dlp` into the work directory, one
/// file per candidate id.
pub struct YtDlpFetcher {
    work_dir: PathBuf,
    timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout,
        }
    }

    /// Best effort: remove any partial artifact left for `id`.
    fn cleanup_partials(&self, id: &str) {
        for ext in MEDIA_EXTENSIONS.iter().chain(["part"].iter()) {
            let candidate = self.work_dir.join(format!("{id}.{ext}"));
            if candidate.exists() {
                if let Err(e) = std::fs::remove_file(&candidate) {
                    warn!(path = %candidate.display(), error = %e, "failed to remove partial file");
                }
            }
        }
    }

    fn find_output(&self, id: &str) -> Option<PathBuf> {
        MEDIA_EXTENSIONS
            .iter()
            .map(|ext| self.work_dir.join(format!("{id}.{ext}")))
            .find(|p| p.exists())
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    async fn download(&self, source_uri: &str, id: &str) -> Result<PathBuf, FetchError> {
        std::fs::create_dir_all(&self.work_dir)
            .map_err(FetchError::Launch)?;

        let template = self.work_dir.join(format!("{id}.%(ext)s"));
        info!(id, uri = source_uri, "downloading media via yt-dlp");

        let run = Command::new("yt-dlp")
            .arg("--format")
            .arg("best[ext=mp4]/best")
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--socket-timeout")
            .arg("30")
            .arg("--retries")
            .arg("3")
            .arg("--output")
            .arg(&template)
            .arg(source_uri)
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.timeout, run).await {
            Ok(result) => result.map_err(FetchError::Launch)?,
            Err(_) => {
                self.cleanup_partials(id);
                return Err(FetchError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            self.cleanup_partials(id);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Failed(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        match self.find_output(id) {
            Some(path) => {
                let size_mb = std::fs::metadata(&path)
                    .map(|m| m.len() as f64 / (1024.0 * 1024.0))
                    .unwrap_or(0.0);
                info!(id, path = %path.display(), size_mb = format!("{size_mb:.1}"), "download complete");
                Ok(path)
            }
            None => {
                self.cleanup_partials(id);
                Err(FetchError::MissingOutput(id.to_string()))
            }
        }
    }
}

/// Reformats a clip to 9:16 vertical with `ffmpeg`, padding rather than
/// cropping so nothing is cut off.
pub struct FfmpegTransformer {
    timeout: Duration,
}

impl FfmpegTransformer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Transformer for FfmpegTransformer {
    async fn reformat(&self, input: &Path) -> Result<PathBuf, TransformError> {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("clip");
        let output = input.with_file_name(format!("{stem}_vertical.mp4"));

        info!(input = %input.display(), output = %output.display(), "reformatting to 9:16");

        let run = Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-vf")
            .arg("scale=1080:1920:force_original_aspect_ratio=decrease,pad=1080:1920:(ow-iw)/2:(oh-ih)/2")
            .arg("-c:a")
            .arg("copy")
            .arg(&output)
            .kill_on_drop(true)
            .output();

        let result = match timeout(self.timeout, run).await {
            Ok(result) => result.map_err(TransformError::Launch)?,
            Err(_) => {
                cleanup_media(&output);
                return Err(TransformError::Timeout(self.timeout));
            }
        };

        if !result.status.success() {
            cleanup_media(&output);
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(TransformError::Failed(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(TransformError::Failed(
                "ffmpeg reported success but wrote no output".to_string(),
            ));
        }

        // The original is superseded; keeping it would defeat the
        // local-storage-never-accumulates rule.
        cleanup_media(input);
        Ok(output)
    }
}

/// Remove a local media file. Never fatal; missing files are fine.
pub fn cleanup_media(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "cleaned up local file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cleanup failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_is_silent_for_missing_files() {
        cleanup_media(Path::new("/nonexistent/clip.mp4"));
    }

    #[test]
    fn vertical_output_keeps_directory_and_stem() {
        let input = Path::new("/work/x_123.mp4");
        let stem = input.file_stem().and_then(|s| s.to_str()).unwrap();
        let output = input.with_file_name(format!("{stem}_vertical.mp4"));
        assert_eq!(output, Path::new("/work/x_123_vertical.mp4"));
    }
}
