use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Output and session directories
    pub output: OutputConfig,

    /// AWS transcription settings
    pub aws: AwsConfig,

    /// AI enhancement settings (summaries and quotes)
    pub enhancement: EnhancementConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base directory for per-item transcript output
    pub output_dir: PathBuf,

    /// Root under which timestamped session directories are created
    pub session_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,

    /// S3 bucket for temporary audio storage
    pub s3_bucket: String,

    /// Optional S3 key prefix
    pub s3_key_prefix: Option<String>,

    /// Default language code (auto-detect if not set)
    pub default_language: Option<String>,

    /// Maximum transcript segment length in seconds
    pub max_segment_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementConfig {
    /// Generate summaries and quotes after transcription
    pub enabled: bool,

    /// Anthropic model to use
    pub model: String,

    /// Character budget for transcript text sent to the model, to stay
    /// inside token limits
    pub max_input_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: OutputConfig {
                output_dir: dirs::home_dir()
                    .map(|home| home.join("transcripts"))
                    .unwrap_or_else(|| PathBuf::from("transcripts")),
                session_root: PathBuf::from(".data/transcribe"),
            },
            aws: AwsConfig {
                region: "us-east-1".to_string(),
                s3_bucket: "".to_string(),
                s3_key_prefix: Some("transcribe/".to_string()),
                default_language: None,
                max_segment_seconds: 10.0,
            },
            enhancement: EnhancementConfig {
                enabled: true,
                model: "claude-3-haiku-20240307".to_string(),
                max_input_chars: 15_000,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // Current directory first, for easy per-project overrides
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcribe-pipeline").join("config.yaml"))
    }

    fn validate(&self) -> Result<()> {
        if self.enhancement.max_input_chars == 0 {
            anyhow::bail!("enhancement.max_input_chars must be positive");
        }

        if self.aws.max_segment_seconds <= 0.0 {
            anyhow::bail!("aws.max_segment_seconds must be positive");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Output Directory: {}", self.output.output_dir.display());
        println!("  Session Root: {}", self.output.session_root.display());
        println!("  AWS Region: {}", self.aws.region);
        println!("  S3 Bucket: {}", self.aws.s3_bucket);
        if let Some(prefix) = &self.aws.s3_key_prefix {
            println!("  S3 Prefix: {}", prefix);
        }
        println!("  Enhancement: {}", if self.enhancement.enabled { "enabled" } else { "disabled" });
        println!("  Enhancement Model: {}", self.enhancement.model);
    }
}
