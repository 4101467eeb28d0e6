use anyhow::Context;
use std::path::Path;
use tokio::fs;
use tokio::process::Command;

use super::{SourceInfo, SourceKind};
use crate::{PipelineError, Result};

const COPYABLE_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac"];

/// Local media file handling via ffprobe/ffmpeg
pub struct LocalMedia;

impl LocalMedia {
    pub fn new() -> Self {
        Self
    }

    /// Resolve metadata for a local file
    ///
    /// The file must exist, be non-empty, and contain at least one audio
    /// stream. Item id is the file stem; duration comes from ffprobe when it
    /// can report one.
    pub async fn probe(&self, path: &Path) -> Result<SourceInfo> {
        self.validate_file(path).await?;
        let duration = self.probe_duration(path).await?;

        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("local_file")
            .to_string();
        let title = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("Local File")
            .to_string();

        let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        Ok(SourceInfo {
            id,
            title,
            duration_seconds: duration.unwrap_or(0.0),
            uploader: None,
            description: None,
            kind: SourceKind::Local { path: absolute },
        })
    }

    async fn validate_file(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PipelineError::SourceUnavailable(format!(
                "file does not exist: {}",
                path.display()
            ))
            .into());
        }

        if !path.is_file() {
            return Err(PipelineError::SourceUnavailable(format!(
                "path is not a file: {}",
                path.display()
            ))
            .into());
        }

        let metadata = fs::metadata(path)
            .await
            .with_context(|| format!("Cannot access file {}", path.display()))?;
        if metadata.len() == 0 {
            return Err(PipelineError::SourceUnavailable(format!(
                "file is empty: {}",
                path.display()
            ))
            .into());
        }

        Ok(())
    }

    /// Read duration and confirm an audio stream exists, using ffprobe
    async fn probe_duration(&self, path: &Path) -> Result<Option<f64>> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                &path.to_string_lossy(),
            ])
            .output()
            .await
            .context("Failed to run ffprobe")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to analyze file with ffprobe: {}", error.trim());
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout)?;

        let has_audio = info["streams"]
            .as_array()
            .map(|streams| {
                streams
                    .iter()
                    .any(|stream| stream["codec_type"].as_str() == Some("audio"))
            })
            .unwrap_or(false);
        if !has_audio {
            anyhow::bail!("File does not contain any audio streams: {}", path.display());
        }

        let duration = info["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok());

        Ok(duration)
    }

    /// Place a transcription-ready mp3 at the target path
    ///
    /// mp3/m4a sources are copied as-is; everything else (video containers,
    /// wav, flac, ogg) is converted with ffmpeg.
    pub async fn prepare_audio(&self, source_path: &Path, target_path: &Path) -> Result<()> {
        tracing::debug!(
            "Preparing local audio: {} -> {}",
            source_path.display(),
            target_path.display()
        );

        let extension = source_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        let can_copy = extension
            .as_deref()
            .map(|ext| COPYABLE_EXTENSIONS.contains(&ext))
            .unwrap_or(false);

        if can_copy {
            fs::copy(source_path, target_path).await?;
            Ok(())
        } else {
            self.convert_to_mp3(source_path, target_path).await
        }
    }

    async fn convert_to_mp3(&self, source_path: &Path, target_path: &Path) -> Result<()> {
        tracing::debug!("Converting {} to mp3", source_path.display());

        let output = Command::new("ffmpeg")
            .args([
                "-i",
                &source_path.to_string_lossy(),
                "-vn",
                "-acodec",
                "mp3",
                "-ab",
                "128k",
                "-ar",
                "44100",
                "-y",
                &target_path.to_string_lossy(),
            ])
            .output()
            .await
            .context("Failed to run ffmpeg")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to convert file with ffmpeg: {}", error.trim());
        }

        Ok(())
    }
}

impl Default for LocalMedia {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_probe_missing_file_fails() {
        let local = LocalMedia::new();
        let err = local.probe(Path::new("/no/such/file.mp3")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_probe_empty_file_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.mp3");
        fs_err::write(&path, b"").unwrap();

        let local = LocalMedia::new();
        let err = local.probe(&path).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
