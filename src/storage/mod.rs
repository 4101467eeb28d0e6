use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::insights::{generate_insights, Quote, Summary};
use crate::sources::SourceInfo;
use crate::transcribe::Transcript;
use crate::utils::sanitize_filename;
use crate::Result;

pub mod formatter;

/// Renders transcripts and insights to disk
#[async_trait]
pub trait TranscriptRenderer: Send + Sync {
    /// Save all transcript artifacts for one item; returns the item's
    /// output directory
    async fn save(
        &self,
        transcript: &Transcript,
        info: &SourceInfo,
        audio_path: &Path,
    ) -> Result<PathBuf>;

    /// Save the combined insights document into an item's output directory
    async fn save_insights(
        &self,
        summary: Option<&Summary>,
        quotes: &[Quote],
        title: &str,
        output_dir: &Path,
    ) -> Result<PathBuf>;
}

/// Saves transcripts in multiple formats to per-item directories
pub struct TranscriptStorage {
    output_dir: PathBuf,
}

impl TranscriptStorage {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Output directory for one item, named by its sanitized id
    pub fn item_dir(&self, item_id: &str) -> PathBuf {
        self.output_dir.join(sanitize_filename(item_id))
    }

    fn save_json(
        &self,
        transcript: &Transcript,
        info: &SourceInfo,
        item_dir: &Path,
        audio_path: &Path,
    ) -> Result<PathBuf> {
        let json_path = item_dir.join("transcript.json");

        let audio_metadata = fs_err::metadata(audio_path).ok().map(|meta| {
            serde_json::json!({
                "filename": audio_path.file_name().and_then(|n| n.to_str()),
                "size_mb": (meta.len() as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
                "format": "mp3",
            })
        });

        let data = serde_json::json!({
            "source": info,
            "transcript": transcript,
            "audio": audio_metadata,
            "metadata": {
                "transcribed_at": chrono::Utc::now(),
                "version": "1.0",
            },
        });

        fs_err::write(&json_path, serde_json::to_string_pretty(&data)?)?;
        Ok(json_path)
    }

    fn save_markdown(
        &self,
        transcript: &Transcript,
        info: &SourceInfo,
        item_dir: &Path,
    ) -> Result<PathBuf> {
        let md_path = item_dir.join("transcript.md");
        let content = formatter::format_transcript(transcript, info);
        fs_err::write(&md_path, content)?;
        Ok(md_path)
    }

    fn save_vtt(&self, transcript: &Transcript, item_dir: &Path) -> Result<PathBuf> {
        let vtt_path = item_dir.join("transcript.vtt");

        let mut lines = vec!["WEBVTT".to_string(), String::new()];
        for seg in &transcript.segments {
            lines.push(format!(
                "{} --> {}",
                seconds_to_vtt(seg.start),
                seconds_to_vtt(seg.end)
            ));
            lines.push(seg.text.trim().to_string());
            lines.push(String::new());
        }

        fs_err::write(&vtt_path, lines.join("\n"))?;
        Ok(vtt_path)
    }

    fn save_srt(&self, transcript: &Transcript, item_dir: &Path) -> Result<PathBuf> {
        let srt_path = item_dir.join("transcript.srt");

        let mut lines = Vec::new();
        for (i, seg) in transcript.segments.iter().enumerate() {
            lines.push((i + 1).to_string());
            lines.push(format!(
                "{} --> {}",
                seconds_to_srt(seg.start),
                seconds_to_srt(seg.end)
            ));
            lines.push(seg.text.trim().to_string());
            lines.push(String::new());
        }

        fs_err::write(&srt_path, lines.join("\n"))?;
        Ok(srt_path)
    }
}

#[async_trait]
impl TranscriptRenderer for TranscriptStorage {
    async fn save(
        &self,
        transcript: &Transcript,
        info: &SourceInfo,
        audio_path: &Path,
    ) -> Result<PathBuf> {
        let item_dir = self.item_dir(&info.id);
        fs_err::create_dir_all(&item_dir)?;

        tracing::info!("Saving transcripts to: {}", item_dir.display());

        let mut saved = vec![
            self.save_json(transcript, info, &item_dir, audio_path)?,
            self.save_markdown(transcript, info, &item_dir)?,
        ];

        if !transcript.segments.is_empty() {
            saved.push(self.save_vtt(transcript, &item_dir)?);
            saved.push(self.save_srt(transcript, &item_dir)?);
        }

        tracing::info!("Saved {} files", saved.len());
        Ok(item_dir)
    }

    async fn save_insights(
        &self,
        summary: Option<&Summary>,
        quotes: &[Quote],
        title: &str,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let insights_path = output_dir.join("insights.md");
        let content = generate_insights(summary, quotes, title);
        fs_err::write(&insights_path, content)?;

        tracing::info!("Saved insights to: {}", insights_path.display());
        Ok(insights_path)
    }
}

/// WebVTT timestamp (HH:MM:SS.mmm)
fn seconds_to_vtt(seconds: f64) -> String {
    let hours = (seconds / 3600.0) as u64;
    let minutes = ((seconds % 3600.0) / 60.0) as u64;
    let secs = seconds % 60.0;
    format!("{:02}:{:02}:{:06.3}", hours, minutes, secs)
}

/// SRT timestamp (HH:MM:SS,mmm)
fn seconds_to_srt(seconds: f64) -> String {
    let hours = (seconds / 3600.0) as u64;
    let minutes = ((seconds % 3600.0) / 60.0) as u64;
    let secs = (seconds % 60.0) as u64;
    let millis = ((seconds % 1.0) * 1000.0) as u64;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
