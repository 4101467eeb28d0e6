use anyhow::Context;
use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_transcribe::types::{Media, MediaFormat, TranscriptionJob, TranscriptionJobStatus};
use aws_sdk_transcribe::Client as TranscribeClient;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use super::{Transcriber, Transcript, TranscriptSegment};
use crate::config::AwsConfig;
use crate::Result;

/// AWS Transcribe batch pricing, USD per minute (first tier)
const COST_PER_MINUTE: f64 = 0.024;

/// Start a new segment after this much silence between words
const SEGMENT_GAP_SECONDS: f64 = 1.0;

/// Transcriber backed by AWS Transcribe, with S3 staging for the audio
pub struct AwsTranscriber {
    s3_client: S3Client,
    transcribe_client: TranscribeClient,
    bucket: String,
    key_prefix: String,
    default_language: Option<String>,
    max_segment_seconds: f64,
}

impl AwsTranscriber {
    pub async fn new(config: &AwsConfig) -> Result<Self> {
        if config.s3_bucket.is_empty() {
            anyhow::bail!("AWS S3 bucket must be configured for transcription");
        }

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        Ok(Self {
            s3_client: S3Client::new(&aws_config),
            transcribe_client: TranscribeClient::new(&aws_config),
            bucket: config.s3_bucket.clone(),
            key_prefix: config.s3_key_prefix.clone().unwrap_or_default(),
            default_language: config.default_language.clone(),
            max_segment_seconds: config.max_segment_seconds,
        })
    }

    async fn upload_to_s3(&self, audio_path: &Path) -> Result<String> {
        let key = format!(
            "{}audio_{}_{}.mp3",
            self.key_prefix,
            Uuid::new_v4(),
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        );

        tracing::info!("Uploading audio to S3: s3://{}/{}", self.bucket, key);

        let content = fs_err::read(audio_path)?;

        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(content.into())
            .content_type("audio/mpeg")
            .send()
            .await
            .context("Failed to upload audio to S3")?;

        Ok(key)
    }

    async fn start_job(&self, s3_key: &str) -> Result<String> {
        let job_name = format!("transcribe_{}", Uuid::new_v4());
        let media_uri = format!("s3://{}/{}", self.bucket, s3_key);

        tracing::info!("Starting transcription job: {}", job_name);

        let media = Media::builder().media_file_uri(media_uri).build();

        let mut job_builder = self
            .transcribe_client
            .start_transcription_job()
            .transcription_job_name(&job_name)
            .media_format(MediaFormat::Mp3)
            .media(media);

        if let Some(lang) = &self.default_language {
            tracing::info!("Using configured language: {}", lang);
            job_builder = job_builder.language_code(lang.parse()?);
        } else {
            tracing::info!("Using automatic language detection");
            job_builder = job_builder.identify_language(true);
        }

        job_builder
            .send()
            .await
            .context("Failed to start transcription job")?;

        Ok(job_name)
    }

    async fn get_job(&self, job_name: &str) -> Result<TranscriptionJob> {
        let response = self
            .transcribe_client
            .get_transcription_job()
            .transcription_job_name(job_name)
            .send()
            .await
            .context("Failed to get transcription job status")?;

        response
            .transcription_job()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Transcription job not found: {}", job_name))
    }

    /// Poll until the job finishes, with backoff up to 30 seconds
    async fn wait_for_job(&self, job_name: &str) -> Result<TranscriptionJob> {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        progress.set_message("Waiting for transcription job...");

        let start_time = std::time::Instant::now();
        let mut check_count: u64 = 0;

        loop {
            check_count += 1;
            let job = self.get_job(job_name).await?;

            match job.transcription_job_status() {
                Some(TranscriptionJobStatus::InProgress) | Some(TranscriptionJobStatus::Queued) => {
                    progress.set_message(format!(
                        "Transcribing... ({}s elapsed)",
                        start_time.elapsed().as_secs()
                    ));
                    let wait_time = std::cmp::min(5 + (check_count - 1) * 2, 30);
                    sleep(Duration::from_secs(wait_time)).await;
                }
                Some(TranscriptionJobStatus::Completed) => {
                    progress.finish_with_message("Transcription completed");
                    return Ok(job);
                }
                Some(TranscriptionJobStatus::Failed) => {
                    progress.finish_with_message("Transcription failed");
                    let reason = job.failure_reason().unwrap_or("Unknown error");
                    anyhow::bail!("Transcription job failed: {}", reason);
                }
                _ => {
                    progress.finish_with_message("Transcription status unknown");
                    anyhow::bail!("Unexpected transcription job status");
                }
            }
        }
    }

    async fn download_transcript(&self, uri: &str) -> Result<String> {
        let response = reqwest::get(uri)
            .await
            .context("Failed to download transcript")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download transcript: HTTP {}", response.status());
        }

        response
            .text()
            .await
            .context("Failed to read transcript content")
    }

    async fn cleanup_s3(&self, s3_key: &str) -> Result<()> {
        tracing::debug!("Cleaning up S3 object: {}", s3_key);

        self.s3_client
            .delete_object()
            .bucket(&self.bucket)
            .key(s3_key)
            .send()
            .await
            .context("Failed to clean up S3 object")?;

        Ok(())
    }

    fn parse_transcript(&self, json: &str, language: Option<String>) -> Result<Transcript> {
        let aws_transcript: AwsTranscript =
            serde_json::from_str(json).context("Failed to parse transcript JSON")?;

        let text = aws_transcript
            .results
            .transcripts
            .first()
            .map(|t| t.transcript.clone())
            .unwrap_or_default();

        let segments = group_items_into_segments(&aws_transcript.results.items, self.max_segment_seconds);
        let duration_seconds = segments.last().map(|s| s.end).unwrap_or(0.0);

        Ok(Transcript {
            text,
            language,
            duration_seconds,
            segments,
        })
    }
}

#[async_trait]
impl Transcriber for AwsTranscriber {
    async fn transcribe(&self, audio_path: &Path, hint: &str) -> Result<Transcript> {
        tracing::debug!("Transcribing {} ({})", audio_path.display(), hint);

        let s3_key = self.upload_to_s3(audio_path).await?;

        // Keep the staged object around until the job is done, then best-effort
        // delete it whatever the outcome
        let result = async {
            let job_name = self.start_job(&s3_key).await?;
            let job = self.wait_for_job(&job_name).await?;

            let uri = job
                .transcript()
                .and_then(|t| t.transcript_file_uri())
                .ok_or_else(|| anyhow::anyhow!("No transcript URI found"))?;

            let language = job.language_code().map(|lc| lc.as_str().to_string());
            let json = self.download_transcript(uri).await?;
            self.parse_transcript(&json, language)
        }
        .await;

        if let Err(e) = self.cleanup_s3(&s3_key).await {
            tracing::warn!("S3 cleanup failed: {}", e);
        }

        result
    }

    fn estimate_cost(&self, duration_seconds: f64) -> Option<f64> {
        Some(duration_seconds / 60.0 * COST_PER_MINUTE)
    }
}

/// AWS Transcribe result JSON format (the document behind the transcript URI)
#[derive(Debug, Deserialize)]
struct AwsTranscript {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    transcripts: Vec<TranscriptText>,
    items: Vec<TranscriptItem>,
}

#[derive(Debug, Deserialize)]
struct TranscriptText {
    transcript: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptItem {
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(rename = "type")]
    item_type: String,
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    confidence: Option<String>,
    content: String,
}

/// Group word-level items into sentence-ish segments
///
/// A segment ends on a silence gap, on sentence punctuation once the segment
/// is at least half the maximum length, or when the maximum length is hit.
fn group_items_into_segments(items: &[TranscriptItem], max_segment_seconds: f64) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();

    let mut text = String::new();
    let mut seg_start: Option<f64> = None;
    let mut seg_end: Option<f64> = None;
    let mut confidences: Vec<f64> = Vec::new();

    let flush = |segments: &mut Vec<TranscriptSegment>,
                 text: &mut String,
                 seg_start: &mut Option<f64>,
                 seg_end: &mut Option<f64>,
                 confidences: &mut Vec<f64>| {
        if let (Some(start), Some(end)) = (*seg_start, *seg_end) {
            if !text.is_empty() {
                segments.push(TranscriptSegment {
                    start,
                    end,
                    text: text.trim().to_string(),
                    confidence: average(confidences),
                });
            }
        }
        text.clear();
        *seg_start = None;
        *seg_end = None;
        confidences.clear();
    };

    for item in items {
        match item.item_type.as_str() {
            "pronunciation" => {
                let start = item.start_time.as_deref().and_then(|s| s.parse::<f64>().ok());
                let end = item.end_time.as_deref().and_then(|s| s.parse::<f64>().ok());
                let word = item
                    .alternatives
                    .first()
                    .map(|alt| alt.content.as_str())
                    .unwrap_or_default();
                let confidence = item
                    .alternatives
                    .first()
                    .and_then(|alt| alt.confidence.as_deref())
                    .and_then(|c| c.parse::<f64>().ok());

                let gap = start
                    .zip(seg_end)
                    .map(|(s, e)| s - e > SEGMENT_GAP_SECONDS)
                    .unwrap_or(false);
                let too_long = seg_start
                    .zip(start)
                    .map(|(seg, s)| s - seg > max_segment_seconds)
                    .unwrap_or(false);

                if gap || too_long {
                    flush(&mut segments, &mut text, &mut seg_start, &mut seg_end, &mut confidences);
                }

                if text.is_empty() {
                    seg_start = start;
                } else {
                    text.push(' ');
                }
                text.push_str(word);
                seg_end = end.or(seg_end);
                if let Some(c) = confidence {
                    confidences.push(c);
                }
            }
            "punctuation" => {
                if let Some(alt) = item.alternatives.first() {
                    text.push_str(&alt.content);

                    let sentence_end = matches!(alt.content.as_str(), "." | "!" | "?");
                    let long_enough = seg_start
                        .zip(seg_end)
                        .map(|(s, e)| e - s > max_segment_seconds / 2.0)
                        .unwrap_or(false);
                    if sentence_end && long_enough {
                        flush(&mut segments, &mut text, &mut seg_start, &mut seg_end, &mut confidences);
                    }
                }
            }
            _ => {}
        }
    }

    flush(&mut segments, &mut text, &mut seg_start, &mut seg_end, &mut confidences);

    segments
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
