use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;

/// Pipeline processing stage
///
/// The persisted stage always reflects what was being attempted, so a crash
/// mid-stage leaves a durable record of where work stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Initialized,
    Loading,
    Extracting,
    Transcribing,
    Saving,
    Enhancing,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initialized => "initialized",
            Stage::Loading => "loading",
            Stage::Extracting => "extracting",
            Stage::Transcribing => "transcribing",
            Stage::Saving => "saving",
            Stage::Enhancing => "enhancing",
            Stage::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome status of a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Failed,
}

/// Result of processing a single media source
///
/// Created once processing concludes and never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Stable identifier for the item; falls back to the raw source string
    /// when the source failed before identity was resolved
    pub item_id: String,

    /// Original input (URL or path), used as the resume key
    pub source: String,

    pub status: ItemStatus,

    /// Where artifacts were written (success only)
    #[serde(default)]
    pub output_location: Option<String>,

    /// Failure description (failure only)
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub duration_seconds: f64,

    #[serde(default)]
    pub cost_estimate: f64,

    pub recorded_at: DateTime<Utc>,
}

impl ProcessingResult {
    pub fn success(
        item_id: impl Into<String>,
        source: impl Into<String>,
        output_location: impl Into<String>,
        duration_seconds: f64,
        cost_estimate: f64,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            source: source.into(),
            status: ItemStatus::Success,
            output_location: Some(output_location.into()),
            error: None,
            duration_seconds,
            cost_estimate,
            recorded_at: Utc::now(),
        }
    }

    pub fn failure(
        item_id: impl Into<String>,
        source: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            source: source.into(),
            status: ItemStatus::Failed,
            output_location: None,
            error: Some(error.into()),
            duration_seconds: 0.0,
            cost_estimate: 0.0,
            recorded_at: Utc::now(),
        }
    }
}

/// Complete pipeline state, persisted as one JSON document per session directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub stage: Stage,
    pub current_item: Option<String>,

    /// Full input list for this run; set once and not mutated by resume
    pub sources: Vec<String>,
    pub total_items: usize,

    /// Append-only ledger of successes and failures
    pub processed: Vec<ProcessingResult>,
    pub failed: Vec<ProcessingResult>,

    /// Running sums, updated exactly once per recorded success
    pub total_duration_seconds: f64,
    pub total_cost_estimate: f64,

    pub output_location: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            stage: Stage::Initialized,
            current_item: None,
            sources: Vec::new(),
            total_items: 0,
            processed: Vec::new(),
            failed: Vec::new(),
            total_duration_seconds: 0.0,
            total_cost_estimate: 0.0,
            output_location: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable state store with atomic persistence
///
/// Exclusively owns the canonical `PipelineState` for its session directory.
/// Exactly one orchestrator must be active against a given directory at a
/// time; callers get distinct timestamped directories per run by default.
pub struct StateStore {
    session_dir: PathBuf,
    state_file: PathBuf,
    state: PipelineState,
}

impl StateStore {
    /// Open a state store, resuming persisted state when a valid file exists
    ///
    /// A corrupt or unparsable state file is treated as absent - forward
    /// progress must never be blocked by bad state on disk.
    pub fn open(session_dir: impl Into<PathBuf>) -> Result<Self> {
        let session_dir = session_dir.into();
        fs_err::create_dir_all(&session_dir)
            .context("Failed to create session directory")?;

        let state_file = session_dir.join("state.json");
        let state = Self::load_or_fresh(&state_file);

        Ok(Self {
            session_dir,
            state_file,
            state,
        })
    }

    /// Default session directory: `<root>/<YYYYmmdd_HHMMSS>`
    pub fn timestamped_session_dir(root: &Path) -> PathBuf {
        root.join(Utc::now().format("%Y%m%d_%H%M%S").to_string())
    }

    fn load_or_fresh(state_file: &Path) -> PipelineState {
        if !state_file.exists() {
            return PipelineState::new();
        }

        match Self::load(state_file) {
            Ok(state) => {
                tracing::info!(
                    "Resumed state from {} (stage: {}, processed: {}, failed: {})",
                    state_file.display(),
                    state.stage,
                    state.processed.len(),
                    state.failed.len()
                );
                state
            }
            Err(e) => {
                tracing::warn!("Could not load state ({}), starting fresh", e);
                PipelineState::new()
            }
        }
    }

    fn load(state_file: &Path) -> Result<PipelineState> {
        let content = fs_err::read_to_string(state_file)?;
        let state = serde_json::from_str(&content)?;
        Ok(state)
    }

    /// Persist the current state
    ///
    /// Write errors are logged, not fatal: the in-memory state remains
    /// authoritative for the rest of the run.
    pub fn save(&mut self) {
        self.state.updated_at = Utc::now();

        if let Err(e) = self.write_atomic() {
            tracing::error!("Failed to save state to {}: {}", self.state_file.display(), e);
        }
    }

    /// Write via temp file + rename so a crash never leaves a partial file
    fn write_atomic(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.state)
            .context("Failed to serialize state")?;

        let tmp_file = self.state_file.with_extension("json.tmp");
        fs_err::write(&tmp_file, content)?;
        fs_err::rename(&tmp_file, &self.state_file)?;

        Ok(())
    }

    /// Discard all history and persist a fresh state
    pub fn reset(&mut self) {
        self.state = PipelineState::new();
        self.save();
        tracing::info!("State reset for fresh pipeline run");
    }

    /// Update the current stage and in-flight item, persisting immediately
    pub fn set_stage(&mut self, stage: Stage, current_item: Option<&str>) {
        let old_stage = self.state.stage;
        self.state.stage = stage;
        self.state.current_item = current_item.map(|s| s.to_string());

        match current_item {
            Some(item) => tracing::info!("Stage: {} -> {} (processing: {})", old_stage, stage, item),
            None => tracing::info!("Stage: {} -> {}", old_stage, stage),
        }

        self.save();
    }

    /// Record a successful item; duration and cost accumulate into the
    /// running totals exactly once, here
    pub fn record_success(&mut self, result: ProcessingResult) {
        self.state.total_duration_seconds += result.duration_seconds;
        self.state.total_cost_estimate += result.cost_estimate;
        tracing::info!(
            "Processed {}/{}: {}",
            self.state.processed.len() + 1,
            self.state.total_items,
            result.item_id
        );
        self.state.processed.push(result);
        self.save();
    }

    /// Record a failed item; totals are unaffected
    pub fn record_failure(&mut self, result: ProcessingResult) {
        tracing::warn!(
            "Failed: {} - {}",
            result.item_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
        self.state.failed.push(result);
        self.save();
    }

    /// True iff some success entry carries this item id
    pub fn has_processed(&self, item_id: &str) -> bool {
        self.state.processed.iter().any(|r| r.item_id == item_id)
    }

    /// Sources with no ledger entry yet, in original input order
    pub fn pending_sources(&self) -> Vec<String> {
        let done: std::collections::HashSet<&str> = self
            .state
            .processed
            .iter()
            .chain(self.state.failed.iter())
            .map(|r| r.source.as_str())
            .collect();

        self.state
            .sources
            .iter()
            .filter(|s| !done.contains(s.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.state.stage == Stage::Complete
    }

    /// Mark the run complete and log summary statistics
    ///
    /// "Complete" means no more pending work, not that every item succeeded.
    pub fn mark_complete(&mut self) {
        self.set_stage(Stage::Complete, None);

        let total = self.state.processed.len();
        let failed = self.state.failed.len();
        tracing::info!("Transcription pipeline complete: {} processed", total);
        if failed > 0 {
            tracing::info!("  Failed: {}", failed);
        }
        tracing::info!(
            "  Total duration: {:.1} minutes, estimated cost: ${:.2}",
            self.state.total_duration_seconds / 60.0,
            self.state.total_cost_estimate
        );
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Initialize the input list for a fresh (non-resume) run
    pub fn init_sources(&mut self, sources: &[String], output_location: Option<String>) {
        self.state.sources = sources.to_vec();
        self.state.total_items = sources.len();
        self.state.output_location = output_location;
        self.save();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn success(item_id: &str, source: &str, duration: f64, cost: f64) -> ProcessingResult {
        ProcessingResult::success(item_id, source, "/tmp/out", duration, cost)
    }

    #[test]
    fn test_fresh_state_defaults() {
        let state = PipelineState::new();
        assert_eq!(state.stage, Stage::Initialized);
        assert_eq!(state.total_items, 0);
        assert!(state.processed.is_empty());
        assert!(state.failed.is_empty());
        assert_eq!(state.total_duration_seconds, 0.0);
    }

    #[test]
    fn test_open_creates_session_dir() {
        let tmp = TempDir::new().unwrap();
        let session = tmp.path().join("session");
        let store = StateStore::open(&session).unwrap();

        assert!(session.exists());
        assert_eq!(store.state().stage, Stage::Initialized);
        // State file is written on first save, not during open
        assert!(!session.join("state.json").exists());
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let session = tmp.path().join("session");

        let mut store = StateStore::open(&session).unwrap();
        store.record_success(success("test123", "https://example.com/video", 120.0, 0.05));

        let store2 = StateStore::open(&session).unwrap();
        assert_eq!(store2.state().processed.len(), 1);
        assert_eq!(store2.state().processed[0].item_id, "test123");
        assert_eq!(store2.state().total_duration_seconds, 120.0);
        assert_eq!(store2.state().total_cost_estimate, 0.05);
    }

    #[test]
    fn test_totals_never_double_apply_across_reloads() {
        let tmp = TempDir::new().unwrap();
        let session = tmp.path().join("session");

        let mut store = StateStore::open(&session).unwrap();
        store.record_success(success("a", "src-a", 100.0, 0.10));
        drop(store);

        // Reload, then record one more; historical totals must not re-apply
        let mut store = StateStore::open(&session).unwrap();
        store.record_success(success("b", "src-b", 50.0, 0.02));

        assert_eq!(store.state().total_duration_seconds, 150.0);
        assert!((store.state().total_cost_estimate - 0.12).abs() < 1e-9);

        let reloaded = StateStore::open(&session).unwrap();
        assert_eq!(reloaded.state().total_duration_seconds, 150.0);
    }

    #[test]
    fn test_failure_does_not_affect_totals() {
        let tmp = TempDir::new().unwrap();
        let mut store = StateStore::open(tmp.path().join("s")).unwrap();

        store.record_failure(ProcessingResult::failure("bad", "bad", "boom"));
        assert_eq!(store.state().total_duration_seconds, 0.0);
        assert_eq!(store.state().total_cost_estimate, 0.0);
        assert_eq!(store.state().failed.len(), 1);
    }

    #[test]
    fn test_has_processed() {
        let tmp = TempDir::new().unwrap();
        let mut store = StateStore::open(tmp.path().join("s")).unwrap();

        store.record_success(success("test123", "https://example.com/video", 0.0, 0.0));
        assert!(store.has_processed("test123"));
        assert!(!store.has_processed("test456"));
    }

    #[test]
    fn test_pending_sources_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let mut store = StateStore::open(tmp.path().join("s")).unwrap();
        store.init_sources(
            &["video1".into(), "video2".into(), "video3".into()],
            None,
        );

        store.record_success(success("vid2", "video2", 0.0, 0.0));
        assert_eq!(store.pending_sources(), vec!["video1", "video3"]);

        // Failed sources are not pending either
        store.record_failure(ProcessingResult::failure("video3", "video3", "err"));
        assert_eq!(store.pending_sources(), vec!["video1"]);
    }

    #[test]
    fn test_corrupt_state_yields_fresh() {
        let tmp = TempDir::new().unwrap();
        let session = tmp.path().join("session");
        fs_err::create_dir_all(&session).unwrap();
        fs_err::write(session.join("state.json"), "{not valid json!").unwrap();

        let store = StateStore::open(&session).unwrap();
        assert_eq!(store.state().stage, Stage::Initialized);
        assert!(store.state().processed.is_empty());
    }

    #[test]
    fn test_reset_discards_history() {
        let tmp = TempDir::new().unwrap();
        let session = tmp.path().join("s");
        let mut store = StateStore::open(&session).unwrap();
        store.record_success(success("a", "a", 10.0, 0.01));

        store.reset();
        assert!(store.state().processed.is_empty());
        assert_eq!(store.state().total_duration_seconds, 0.0);

        let reloaded = StateStore::open(&session).unwrap();
        assert!(reloaded.state().processed.is_empty());
    }

    #[test]
    fn test_set_stage_persists_immediately() {
        let tmp = TempDir::new().unwrap();
        let session = tmp.path().join("s");
        let mut store = StateStore::open(&session).unwrap();

        store.set_stage(Stage::Transcribing, Some("abc123"));

        let reloaded = StateStore::open(&session).unwrap();
        assert_eq!(reloaded.state().stage, Stage::Transcribing);
        assert_eq!(reloaded.state().current_item.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_mark_complete() {
        let tmp = TempDir::new().unwrap();
        let mut store = StateStore::open(tmp.path().join("s")).unwrap();
        store.mark_complete();
        assert!(store.is_complete());
        assert_eq!(store.state().stage, Stage::Complete);
    }

    #[test]
    fn test_state_file_is_valid_pretty_json() {
        let tmp = TempDir::new().unwrap();
        let session = tmp.path().join("s");
        let mut store = StateStore::open(&session).unwrap();
        store.record_success(success("a", "a", 1.0, 0.0));

        let content = fs_err::read_to_string(session.join("state.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["stage"], "initialized");
        assert!(content.contains('\n'), "state file should be pretty-printed");
        // No leftover temp file after an atomic write
        assert!(!session.join("state.json.tmp").exists());
    }

    #[test]
    fn test_stage_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Enhancing).unwrap(), "\"enhancing\"");
        let s: Stage = serde_json::from_str("\"loading\"").unwrap();
        assert_eq!(s, Stage::Loading);
    }
}
