use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcribe_pipeline::cli::{Cli, Commands};
use transcribe_pipeline::config::Config;
use transcribe_pipeline::pipeline::TranscriptionPipeline;
use transcribe_pipeline::sources::{SourceKind, YtDlp};
use transcribe_pipeline::state::{ItemStatus, PipelineState, StateStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "transcribe=debug,transcribe_pipeline=debug"
    } else {
        "transcribe=info,transcribe_pipeline=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run {
            sources,
            resume,
            session_dir,
            output_dir,
            no_enhance,
            force_download,
            language,
        } => {
            let mut config = Config::load()?;
            if let Some(dir) = output_dir {
                config.output.output_dir = dir;
            }
            if no_enhance {
                config.enhancement.enabled = false;
            }
            if let Some(lang) = language {
                config.aws.default_language = Some(lang);
            }

            check_tooling(&sources).await;

            if resume && session_dir.is_none() {
                eprintln!(
                    "{}",
                    style("Warning: --resume without --session-dir starts in a new session")
                        .yellow()
                );
            }
            let session = session_dir.unwrap_or_else(|| {
                StateStore::timestamped_session_dir(&config.output.session_root)
            });

            tracing::info!("Session directory: {}", session.display());
            let store = StateStore::open(&session)?;

            let mut pipeline =
                TranscriptionPipeline::from_config(&config, store, force_download).await?;
            let success = pipeline.run(&sources, resume).await?;

            print_summary(pipeline.state());

            if !success {
                std::process::exit(1);
            }
        }
        Commands::Status { session_dir } => {
            let store = StateStore::open(&session_dir)?;
            print_summary(store.state());
        }
        Commands::Reset { session_dir } => {
            let mut store = StateStore::open(&session_dir)?;
            store.reset();
            println!("Session reset: {}", session_dir.display());
        }
        Commands::Config { show } => {
            let config = Config::load()?;
            if show {
                config.display();
            } else {
                config.save()?;
                println!("Configuration saved; edit it to adjust settings.");
            }
        }
    }

    Ok(())
}

/// Warn up front when external tools the collaborators shell out to are
/// missing; the run may still work for other source kinds
async fn check_tooling(sources: &[String]) {
    let any_remote = sources
        .iter()
        .any(|s| SourceKind::classify(s).is_remote());

    if any_remote && !YtDlp::new().check_availability().await {
        eprintln!(
            "{}",
            style("Warning: yt-dlp not found; remote sources will fail").yellow()
        );
    }
}

fn print_summary(state: &PipelineState) {
    println!();
    println!("{}", style("Transcription Results").bold().cyan());

    for result in &state.processed {
        println!(
            "  {} {}  {:.1}m  ${:.3}",
            style("ok").green(),
            result.item_id,
            result.duration_seconds / 60.0,
            result.cost_estimate
        );
    }
    for result in &state.failed {
        debug_assert_eq!(result.status, ItemStatus::Failed);
        println!(
            "  {} {}  {}",
            style("failed").red(),
            result.item_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    println!();
    println!(
        "Processed {} of {} (stage: {})",
        state.processed.len(),
        state.total_items,
        state.stage
    );
    if !state.processed.is_empty() {
        println!(
            "Total duration: {:.1} minutes, estimated cost: ${:.2}",
            state.total_duration_seconds / 60.0,
            state.total_cost_estimate
        );
    }
    if !state.failed.is_empty() {
        println!(
            "{}",
            style(format!("{} source(s) failed", state.failed.len())).red()
        );
    }
}
