use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;

pub mod local;
pub mod remote;

pub use local::LocalMedia;
pub use remote::YtDlp;

/// Where a source lives, resolved once up front
///
/// URL vs local-file is a pure classification, not a pipeline stage; each
/// variant carries only the fields it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceKind {
    Remote { url: String },
    Local { path: PathBuf },
}

impl SourceKind {
    pub fn classify(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            SourceKind::Remote {
                url: source.to_string(),
            }
        } else {
            SourceKind::Local {
                path: PathBuf::from(source),
            }
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceKind::Remote { .. })
    }

    /// The source URL, for remote sources only
    pub fn url(&self) -> Option<&str> {
        match self {
            SourceKind::Remote { url } => Some(url),
            SourceKind::Local { .. } => None,
        }
    }
}

/// Resolved identity and metadata for one media source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Stable item identifier (video id for remote, file stem for local)
    pub id: String,

    pub title: String,

    /// Duration in seconds; 0.0 when not yet known (local files are measured
    /// during transcription)
    pub duration_seconds: f64,

    pub uploader: Option<String>,
    pub description: Option<String>,

    pub kind: SourceKind,
}

impl SourceInfo {
    pub fn source_url(&self) -> Option<&str> {
        self.kind.url()
    }
}

/// Resolves a raw source string into item identity and metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, source: &str) -> Result<SourceInfo>;
}

/// Produces a local audio artifact for a resolved source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioAcquirer: Send + Sync {
    async fn acquire(&self, info: &SourceInfo, item_dir: &Path, use_cache: bool)
        -> Result<PathBuf>;
}

/// Default resolver: yt-dlp for remote URLs, ffprobe for local files
pub struct MediaResolver {
    ytdlp: YtDlp,
    local: LocalMedia,
}

impl MediaResolver {
    pub fn new() -> Self {
        Self {
            ytdlp: YtDlp::new(),
            local: LocalMedia::new(),
        }
    }
}

impl Default for MediaResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceResolver for MediaResolver {
    async fn resolve(&self, source: &str) -> Result<SourceInfo> {
        match SourceKind::classify(source) {
            SourceKind::Remote { url } => self.ytdlp.probe(&url).await,
            SourceKind::Local { path } => self.local.probe(&path).await,
        }
    }
}

/// Default acquirer: yt-dlp audio download for remote sources, copy/convert
/// for local files, with a per-item `audio.mp3` cache
pub struct MediaAcquirer {
    ytdlp: YtDlp,
    local: LocalMedia,
}

impl MediaAcquirer {
    pub fn new() -> Self {
        Self {
            ytdlp: YtDlp::new(),
            local: LocalMedia::new(),
        }
    }
}

impl Default for MediaAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioAcquirer for MediaAcquirer {
    async fn acquire(
        &self,
        info: &SourceInfo,
        item_dir: &Path,
        use_cache: bool,
    ) -> Result<PathBuf> {
        fs_err::create_dir_all(item_dir)?;
        let target = item_dir.join("audio.mp3");

        if use_cache && target.exists() {
            tracing::info!("Using cached audio: {}", target.display());
            return Ok(target);
        }

        match &info.kind {
            SourceKind::Remote { url } => {
                self.ytdlp.download_audio(url, &target).await?;
            }
            SourceKind::Local { path } => {
                self.local.prepare_audio(path, &target).await?;
            }
        }

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_remote() {
        let kind = SourceKind::classify("https://youtube.com/watch?v=abc");
        assert!(kind.is_remote());
        assert_eq!(kind.url(), Some("https://youtube.com/watch?v=abc"));

        assert!(SourceKind::classify("http://example.com/a.mp3").is_remote());
    }

    #[test]
    fn test_classify_local() {
        let kind = SourceKind::classify("recordings/meeting.mp4");
        assert!(!kind.is_remote());
        assert_eq!(kind.url(), None);
        match kind {
            SourceKind::Local { path } => {
                assert_eq!(path, PathBuf::from("recordings/meeting.mp4"))
            }
            _ => panic!("expected local"),
        }
    }

    #[test]
    fn test_source_kind_serde_tagged() {
        let kind = SourceKind::Remote {
            url: "https://youtu.be/x".into(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "remote");
        assert_eq!(json["url"], "https://youtu.be/x");
    }
}
