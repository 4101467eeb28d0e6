use anyhow::Context;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{SourceInfo, SourceKind};
use crate::Result;

/// Remote media access via yt-dlp
///
/// yt-dlp handles YouTube and most other platforms as well as direct media
/// URLs, so one backend covers every remote source.
pub struct YtDlp {
    yt_dlp_path: String,
}

impl YtDlp {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Resolve metadata for a remote URL using `yt-dlp --dump-json`
    pub async fn probe(&self, url: &str) -> Result<SourceInfo> {
        tracing::debug!("Resolving remote source: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed for {}: {}", url, error.trim());
        }

        let info: Value = serde_json::from_slice(&output.stdout)
            .context("Failed to parse yt-dlp metadata")?;

        let id = info["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("yt-dlp returned no id for {}", url))?;

        Ok(SourceInfo {
            id,
            title: info["title"].as_str().unwrap_or(url).to_string(),
            duration_seconds: info["duration"].as_f64().unwrap_or(0.0),
            uploader: info["uploader"].as_str().map(|s| s.to_string()),
            description: info["description"].as_str().map(|s| s.to_string()),
            kind: SourceKind::Remote {
                url: url.to_string(),
            },
        })
    }

    /// Download audio directly with yt-dlp, forcing mp3 output
    pub async fn download_audio(&self, url: &str, output_path: &Path) -> Result<()> {
        tracing::debug!("Downloading audio for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                &output_path.to_string_lossy(),
                "--extract-audio",
                "--audio-format",
                "mp3",
                // Lowest quality is plenty for speech-to-text
                "--audio-quality",
                "9",
                "--format",
                "worstaudio[acodec^=mp4a]/worstaudio[ext=m4a]/worstaudio[ext=mp3]/worstaudio",
                "--no-playlist",
                "--newline",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to download audio for {}: {}", url, error.trim());
        }

        Ok(())
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}
