//! Transcribe Pipeline - A resumable CLI pipeline for transcribing media
//!
//! This library drives media sources (YouTube URLs, direct media URLs, local files)
//! through a fixed stage sequence - load, extract, transcribe, save, enhance - with
//! durable state so an interrupted run can resume exactly where it left off.

pub mod cli;
pub mod config;
pub mod insights;
pub mod pipeline;
pub mod sources;
pub mod state;
pub mod storage;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::{ProgressSink, TranscriptionPipeline};
pub use sources::{SourceInfo, SourceKind};
pub use state::{PipelineState, ProcessingResult, Stage, StateStore};
pub use transcribe::{Transcript, TranscriptSegment};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Source could not be resolved: {0}")]
    SourceUnavailable(String),

    #[error("Audio acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Enrichment failed: {0}")]
    EnrichmentFailed(String),

    #[error("File operation failed: {0}")]
    FileError(String),
}
