use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

pub mod aws;

pub use aws::AwsTranscriber;

/// Individual transcript segment with timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    pub text: String,

    /// Confidence score (0.0 to 1.0), when the backend reports one
    pub confidence: Option<f64>,
}

/// Timestamped transcript for one audio artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Full transcribed text
    pub text: String,

    pub language: Option<String>,

    /// Audio duration in seconds, as measured during transcription
    pub duration_seconds: f64,

    /// Ordered segments with timestamps
    pub segments: Vec<TranscriptSegment>,
}

/// Speech-to-text capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a local audio file; `hint` carries context such as the
    /// media title for backends that accept it
    async fn transcribe(&self, audio_path: &Path, hint: &str) -> Result<Transcript>;

    /// Estimated cost in USD for transcribing the given duration
    fn estimate_cost(&self, duration_seconds: f64) -> Option<f64> {
        let _ = duration_seconds;
        None
    }
}
