use serde_json::json;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::insights::{AnthropicEnricher, Enricher};
use crate::sources::{AudioAcquirer, MediaAcquirer, MediaResolver, SourceResolver};
use crate::state::{PipelineState, ProcessingResult, Stage, StateStore};
use crate::storage::{TranscriptRenderer, TranscriptStorage};
use crate::transcribe::{AwsTranscriber, Transcriber};
use crate::utils::sanitize_filename;
use crate::Result;

/// Observer invoked synchronously at each stage transition
///
/// Errors from the sink are logged and swallowed; the pipeline never aborts
/// because an observer misbehaved.
pub type ProgressSink = Box<dyn Fn(Stage, &serde_json::Value) -> Result<()> + Send + Sync>;

/// Orchestrates the transcription pipeline
///
/// Drives each source through the fixed stage sequence (loading, extracting,
/// transcribing, saving, enhancing), persisting state around every step so
/// an interrupted run resumes exactly where it left off. Strictly sequential:
/// one item completes all its stages before the next begins.
pub struct TranscriptionPipeline {
    store: StateStore,
    resolver: Box<dyn SourceResolver>,
    acquirer: Box<dyn AudioAcquirer>,
    transcriber: Box<dyn Transcriber>,
    renderer: Box<dyn TranscriptRenderer>,
    enricher: Option<Box<dyn Enricher>>,
    progress: Option<ProgressSink>,
    output_dir: PathBuf,
    force_refresh: bool,
}

impl TranscriptionPipeline {
    pub fn new(
        store: StateStore,
        resolver: Box<dyn SourceResolver>,
        acquirer: Box<dyn AudioAcquirer>,
        transcriber: Box<dyn Transcriber>,
        renderer: Box<dyn TranscriptRenderer>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            resolver,
            acquirer,
            transcriber,
            renderer,
            enricher: None,
            progress: None,
            output_dir: output_dir.into(),
            force_refresh: false,
        }
    }

    /// Build a pipeline with the default collaborators from configuration
    pub async fn from_config(config: &Config, store: StateStore, force_refresh: bool) -> Result<Self> {
        let transcriber = AwsTranscriber::new(&config.aws).await?;
        let storage = TranscriptStorage::new(&config.output.output_dir);

        let mut pipeline = Self::new(
            store,
            Box::new(MediaResolver::new()),
            Box::new(MediaAcquirer::new()),
            Box::new(transcriber),
            Box::new(storage),
            config.output.output_dir.clone(),
        )
        .with_force_refresh(force_refresh);

        if config.enhancement.enabled {
            match AnthropicEnricher::from_env(&config.enhancement) {
                Ok(enricher) => {
                    tracing::info!("AI enhancement enabled (summaries and quotes)");
                    pipeline = pipeline.with_enricher(Box::new(enricher));
                }
                Err(e) => tracing::warn!("AI enhancement disabled: {}", e),
            }
        }

        Ok(pipeline)
    }

    pub fn with_enricher(mut self, enricher: Box<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_progress_sink(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Skip the audio cache and re-download on every item
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// Read access to the current pipeline state, for reporting
    pub fn state(&self) -> &PipelineState {
        self.store.state()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    fn report_progress(&self, stage: Stage, data: &serde_json::Value) {
        if let Some(sink) = &self.progress {
            if let Err(e) = sink(stage, data) {
                tracing::warn!("Progress callback failed: {}", e);
            }
        }
    }

    /// Record the stage transition durably, then notify the observer
    fn transition(&mut self, stage: Stage, current_item: Option<&str>, data: serde_json::Value) {
        self.store.set_stage(stage, current_item);
        self.report_progress(stage, &data);
    }

    /// Process a single source through all stages
    ///
    /// Errors are caught at the item boundary and recorded as a failure so
    /// the run can continue; the raw source stands in for the item id when
    /// identity was never resolved.
    pub async fn process_item(&mut self, source: &str) -> bool {
        let mut item_id: Option<String> = None;

        match self.run_item_stages(source, &mut item_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to process {}: {:#}", source, e);
                let id = item_id.unwrap_or_else(|| source.to_string());
                self.store
                    .record_failure(ProcessingResult::failure(id, source, format!("{:#}", e)));
                false
            }
        }
    }

    async fn run_item_stages(&mut self, source: &str, item_id: &mut Option<String>) -> Result<()> {
        self.transition(Stage::Loading, Some(source), json!({ "source": source }));
        let info = self.resolver.resolve(source).await?;
        *item_id = Some(info.id.clone());

        // Idempotent resume at item granularity: a source that resolves to an
        // already-completed item is skipped without re-running any stage
        if self.store.has_processed(&info.id) {
            tracing::info!("Skipping (already processed): {}", info.title);
            return Ok(());
        }

        tracing::info!("Processing: {}", info.title);
        if info.duration_seconds > 0.0 {
            tracing::info!("  Duration: {:.1} minutes", info.duration_seconds / 60.0);
        }

        let item_dir = self.output_dir.join(sanitize_filename(&info.id));

        self.transition(
            Stage::Extracting,
            Some(&info.id),
            json!({ "item_id": info.id, "title": info.title }),
        );
        let audio_path = self
            .acquirer
            .acquire(&info, &item_dir, !self.force_refresh)
            .await?;

        self.transition(
            Stage::Transcribing,
            Some(&info.id),
            json!({ "item_id": info.id, "title": info.title }),
        );
        let hint = format!("Transcription of: {}", info.title);
        let transcript = self.transcriber.transcribe(&audio_path, &hint).await?;

        self.transition(
            Stage::Saving,
            Some(&info.id),
            json!({ "item_id": info.id, "title": info.title }),
        );
        let output_dir = self.renderer.save(&transcript, &info, &audio_path).await?;

        if self.enricher.is_some() {
            self.transition(
                Stage::Enhancing,
                Some(&info.id),
                json!({ "item_id": info.id, "title": info.title }),
            );
            self.enhance(&info, &transcript, &output_dir).await;
        }

        // Local files report no duration up front; the transcript knows it
        let duration = if info.duration_seconds > 0.0 {
            info.duration_seconds
        } else {
            transcript.duration_seconds
        };
        let cost = self.transcriber.estimate_cost(duration).unwrap_or(0.0);

        self.store.record_success(ProcessingResult::success(
            &info.id,
            source,
            output_dir.to_string_lossy(),
            duration,
            cost,
        ));

        Ok(())
    }

    /// Enhancement failures degrade gracefully: the item stays a success,
    /// the failure is surfaced only to logs and the progress sink
    async fn enhance(
        &self,
        info: &crate::sources::SourceInfo,
        transcript: &crate::transcribe::Transcript,
        output_dir: &Path,
    ) {
        let Some(enricher) = &self.enricher else {
            return;
        };

        tracing::info!("Generating AI enhancements...");

        let summary = match enricher.summarize(&transcript.text, &info.title).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!("Summary generation failed: {}", e);
                self.report_progress(
                    Stage::Enhancing,
                    &json!({ "item_id": info.id, "error": e.to_string() }),
                );
                None
            }
        };

        let quotes = match enricher
            .extract_quotes(transcript, info.source_url(), &info.id)
            .await
        {
            Ok(quotes) => quotes,
            Err(e) => {
                tracing::warn!("Quote extraction failed: {}", e);
                self.report_progress(
                    Stage::Enhancing,
                    &json!({ "item_id": info.id, "error": e.to_string() }),
                );
                Vec::new()
            }
        };

        if let Err(e) = self
            .renderer
            .save_insights(summary.as_ref(), &quotes, &info.title, output_dir)
            .await
        {
            tracing::warn!("Failed to save insights (transcript saved): {}", e);
        } else {
            tracing::info!("AI enhancements complete");
        }
    }

    /// Run the pipeline over a list of sources
    ///
    /// Returns `Ok(true)` iff no failures were recorded during this
    /// invocation; failures recorded by an earlier, resumed run do not flip
    /// the result. Errors outside item processing propagate, since they
    /// indicate a control-flow bug rather than a per-item data problem.
    pub async fn run(&mut self, sources: &[String], resume: bool) -> Result<bool> {
        if !resume || self.store.state().sources.is_empty() {
            self.store.init_sources(
                sources,
                Some(self.output_dir.to_string_lossy().into_owned()),
            );
        }

        let to_process: Vec<String> = if resume {
            let pending = self.store.pending_sources();
            if pending.is_empty() {
                tracing::info!("No pending sources to process");
                self.store.mark_complete();
                return Ok(true);
            }
            tracing::info!("Resuming with {} pending sources", pending.len());
            pending
        } else {
            sources.to_vec()
        };

        tracing::info!("Processing {} sources", to_process.len());
        tracing::info!("Output directory: {}", self.output_dir.display());

        let mut all_success = true;
        for (i, source) in to_process.iter().enumerate() {
            tracing::info!("[{}/{}] {}", i + 1, to_process.len(), source);

            if !self.process_item(source).await {
                all_success = false;
            }

            // State persisted after every item regardless of outcome
            self.store.save();
        }

        // Complete means no more pending work, not that every item succeeded
        self.store.mark_complete();

        Ok(all_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{Quote, Summary};
    use crate::sources::{MockAudioAcquirer, MockSourceResolver, SourceInfo, SourceKind};
    use crate::storage::TranscriptRenderer;
    use crate::transcribe::{MockTranscriber, Transcript};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn info(id: &str, source: &str) -> SourceInfo {
        SourceInfo {
            id: id.to_string(),
            title: format!("Title of {}", id),
            duration_seconds: 60.0,
            uploader: None,
            description: None,
            kind: SourceKind::classify(source),
        }
    }

    fn transcript() -> Transcript {
        Transcript {
            text: "Hello world.".to_string(),
            language: Some("en-US".to_string()),
            duration_seconds: 60.0,
            segments: vec![],
        }
    }

    /// Renderer fake that writes nothing and counts saves
    struct FakeRenderer {
        saves: Arc<AtomicUsize>,
        insight_saves: Arc<AtomicUsize>,
    }

    impl FakeRenderer {
        fn new() -> Self {
            Self {
                saves: Arc::new(AtomicUsize::new(0)),
                insight_saves: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl TranscriptRenderer for FakeRenderer {
        async fn save(
            &self,
            _transcript: &Transcript,
            info: &SourceInfo,
            _audio_path: &Path,
        ) -> Result<PathBuf> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(PathBuf::from("/out").join(&info.id))
        }

        async fn save_insights(
            &self,
            _summary: Option<&Summary>,
            _quotes: &[Quote],
            _title: &str,
            output_dir: &Path,
        ) -> Result<PathBuf> {
            self.insight_saves.fetch_add(1, Ordering::SeqCst);
            Ok(output_dir.join("insights.md"))
        }
    }

    /// Enricher fake whose calls always fail
    struct FailingEnricher;

    #[async_trait]
    impl crate::insights::Enricher for FailingEnricher {
        async fn summarize(&self, _text: &str, _title: &str) -> Result<Summary> {
            anyhow::bail!("enrichment backend down")
        }

        async fn extract_quotes(
            &self,
            _transcript: &Transcript,
            _source_url: Option<&str>,
            _item_id: &str,
        ) -> Result<Vec<Quote>> {
            anyhow::bail!("enrichment backend down")
        }
    }

    fn happy_collaborators() -> (MockSourceResolver, MockAudioAcquirer, MockTranscriber) {
        let mut resolver = MockSourceResolver::new();
        resolver
            .expect_resolve()
            .returning(|source| Ok(info(&format!("id_{}", source), source)));

        let mut acquirer = MockAudioAcquirer::new();
        acquirer
            .expect_acquire()
            .returning(|_, item_dir, _| Ok(item_dir.join("audio.mp3")));

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_, _| Ok(transcript()));
        transcriber.expect_estimate_cost().returning(|_| Some(0.05));

        (resolver, acquirer, transcriber)
    }

    fn pipeline_with(
        tmp: &TempDir,
        resolver: MockSourceResolver,
        acquirer: MockAudioAcquirer,
        transcriber: MockTranscriber,
    ) -> TranscriptionPipeline {
        let store = StateStore::open(tmp.path().join("session")).unwrap();
        TranscriptionPipeline::new(
            store,
            Box::new(resolver),
            Box::new(acquirer),
            Box::new(transcriber),
            Box::new(FakeRenderer::new()),
            tmp.path().join("out"),
        )
    }

    #[tokio::test]
    async fn test_process_item_success_records_result() {
        let tmp = TempDir::new().unwrap();
        let (resolver, acquirer, transcriber) = happy_collaborators();
        let mut pipeline = pipeline_with(&tmp, resolver, acquirer, transcriber);

        assert!(pipeline.process_item("video1").await);

        let state = pipeline.state();
        assert_eq!(state.processed.len(), 1);
        assert_eq!(state.processed[0].item_id, "id_video1");
        assert_eq!(state.total_duration_seconds, 60.0);
        assert_eq!(state.total_cost_estimate, 0.05);
    }

    #[tokio::test]
    async fn test_already_processed_item_skips_all_stages() {
        let tmp = TempDir::new().unwrap();

        let mut resolver = MockSourceResolver::new();
        resolver
            .expect_resolve()
            .returning(|source| Ok(info("dup", source)));

        // Acquirer and transcriber must never run for a completed item
        let mut acquirer = MockAudioAcquirer::new();
        acquirer.expect_acquire().times(0);
        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().times(0);

        let mut pipeline = pipeline_with(&tmp, resolver, acquirer, transcriber);
        pipeline
            .store
            .record_success(ProcessingResult::success("dup", "earlier", "/out/dup", 1.0, 0.0));

        assert!(pipeline.process_item("video-again").await);
        assert_eq!(pipeline.state().processed.len(), 1);
    }

    #[tokio::test]
    async fn test_resolver_failure_recorded_with_source_as_id() {
        let tmp = TempDir::new().unwrap();

        let mut resolver = MockSourceResolver::new();
        resolver
            .expect_resolve()
            .returning(|_| anyhow::bail!("unreachable source"));

        let mut pipeline = pipeline_with(
            &tmp,
            resolver,
            MockAudioAcquirer::new(),
            MockTranscriber::new(),
        );

        assert!(!pipeline.process_item("gone").await);

        let state = pipeline.state();
        assert_eq!(state.failed.len(), 1);
        assert_eq!(state.failed[0].item_id, "gone");
        assert_eq!(state.failed[0].source, "gone");
        assert!(state.failed[0].error.as_deref().unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_progress_sink_errors_are_swallowed() {
        let tmp = TempDir::new().unwrap();
        let (resolver, acquirer, transcriber) = happy_collaborators();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let sink: ProgressSink = Box::new(move |_stage, _data| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("sink is broken")
        });

        let mut pipeline =
            pipeline_with(&tmp, resolver, acquirer, transcriber).with_progress_sink(sink);

        assert!(pipeline.process_item("video1").await);
        // Loading, extracting, transcribing, saving
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_progress_sink_sees_stage_transitions() {
        let tmp = TempDir::new().unwrap();
        let (resolver, acquirer, transcriber) = happy_collaborators();

        let stages = Arc::new(std::sync::Mutex::new(Vec::new()));
        let stages_clone = stages.clone();
        let sink: ProgressSink = Box::new(move |stage, data| {
            stages_clone
                .lock()
                .unwrap()
                .push((stage, data.clone()));
            Ok(())
        });

        let mut pipeline =
            pipeline_with(&tmp, resolver, acquirer, transcriber).with_progress_sink(sink);
        assert!(pipeline.process_item("video1").await);

        let seen = stages.lock().unwrap();
        let order: Vec<Stage> = seen.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            order,
            vec![Stage::Loading, Stage::Extracting, Stage::Transcribing, Stage::Saving]
        );
        assert_eq!(seen[0].1["source"], "video1");
        assert_eq!(seen[1].1["item_id"], "id_video1");
    }

    #[tokio::test]
    async fn test_enrichment_failure_keeps_item_successful() {
        let tmp = TempDir::new().unwrap();
        let (resolver, acquirer, transcriber) = happy_collaborators();

        let mut pipeline = pipeline_with(&tmp, resolver, acquirer, transcriber)
            .with_enricher(Box::new(FailingEnricher));

        assert!(pipeline.process_item("video1").await);
        assert_eq!(pipeline.state().processed.len(), 1);
        assert!(pipeline.state().failed.is_empty());
    }

    #[tokio::test]
    async fn test_run_returns_error_free_status_for_this_invocation() {
        let tmp = TempDir::new().unwrap();

        let mut resolver = MockSourceResolver::new();
        resolver.expect_resolve().returning(|source| {
            if source == "bad" {
                anyhow::bail!("cannot resolve")
            } else {
                Ok(info(&format!("id_{}", source), source))
            }
        });

        let mut acquirer = MockAudioAcquirer::new();
        acquirer
            .expect_acquire()
            .returning(|_, item_dir, _| Ok(item_dir.join("audio.mp3")));
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_, _| Ok(transcript()));
        transcriber.expect_estimate_cost().returning(|_| None);

        let mut pipeline = pipeline_with(&tmp, resolver, acquirer, transcriber);

        let sources = vec!["a".to_string(), "bad".to_string(), "c".to_string()];
        let ok = pipeline.run(&sources, false).await.unwrap();

        assert!(!ok);
        assert_eq!(pipeline.state().processed.len(), 2);
        assert_eq!(pipeline.state().failed.len(), 1);
        assert_eq!(pipeline.state().stage, Stage::Complete);
    }
}
