use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcribe",
    about = "Transcribe videos and audio files into searchable transcripts with AI-powered insights",
    version,
    long_about = "A resumable transcription pipeline. Sources can be YouTube URLs, other \
                  remote media URLs, or local audio/video files. State is persisted after \
                  every step, so an interrupted run can be resumed with --resume."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process media sources through the transcription pipeline
    Run {
        /// URLs or local file paths to transcribe
        #[arg(value_name = "SOURCE", required = true)]
        sources: Vec<String>,

        /// Resume from the saved state in the session directory
        #[arg(long)]
        resume: bool,

        /// Session directory for pipeline state (default: new timestamped directory)
        #[arg(long, value_name = "DIR")]
        session_dir: Option<PathBuf>,

        /// Output directory for transcripts (overrides config)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Skip AI enhancements (summaries and quotes)
        #[arg(long)]
        no_enhance: bool,

        /// Skip the audio cache and re-download
        #[arg(long)]
        force_download: bool,

        /// Language code for transcription (auto-detect if not specified)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,
    },

    /// Show the persisted state of a session
    Status {
        /// Session directory to inspect
        #[arg(long, value_name = "DIR")]
        session_dir: PathBuf,
    },

    /// Discard a session's history so the next run starts fresh
    Reset {
        /// Session directory to reset
        #[arg(long, value_name = "DIR")]
        session_dir: PathBuf,
    },

    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
