//! Application configuration types.
//!
//! The top-level [`Config`] is deserialized from JSON or TOML and carries all
//! sub-configs. Every section defaults sensibly so an empty `{}` file is
//! valid. Environment overrides are applied once at startup through
//! [`Config::apply_env_overrides`]; the resulting struct is passed explicitly
//! to everything that shells out to ffmpeg.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::quality::QualityId;
use crate::Error;

/// Default upload size ceiling: 2 GiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub storage: StorageConfig,
    pub intake: IntakeConfig,
    pub pipeline: PipelineConfig,
    pub workers: WorkerConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Parse according to the file extension (`.toml`, otherwise JSON).
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml(&contents)
        } else {
            Self::from_json(&contents)
        }
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None`, missing, or unparseable.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match Self::from_file(path) {
            Ok(cfg) => cfg,
            Err(Error::Io { source }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to load config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Apply `FFMPEG_PATH`, `FFPROBE_PATH`, `UPLOAD_PATH` and `MAX_FILE_SIZE`
    /// from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(p) = non_empty("FFMPEG_PATH") {
            self.tools.ffmpeg_path = Some(PathBuf::from(p));
        }
        if let Some(p) = non_empty("FFPROBE_PATH") {
            self.tools.ffprobe_path = Some(PathBuf::from(p));
        }
        if let Some(p) = non_empty("UPLOAD_PATH") {
            self.storage.upload_dir = PathBuf::from(p);
        }
        if let Some(raw) = non_empty("MAX_FILE_SIZE") {
            match raw.trim().parse::<u64>() {
                Ok(size) => self.intake.max_file_size = size,
                Err(e) => tracing::warn!("Ignoring MAX_FILE_SIZE={raw:?}: {e}"),
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "{name} {} does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        if self.intake.max_file_size == 0 {
            warnings.push("intake.max_file_size is 0; every upload will be rejected".into());
        }

        for q in &self.intake.default_qualities {
            if q.parse::<QualityId>().is_err() {
                warnings.push(format!("intake.default_qualities contains unknown preset '{q}'"));
            }
        }

        if let ExecutionStrategy::BoundedParallel(0) = self.pipeline.execution {
            warnings.push("pipeline.execution bounded_parallel(0) runs one rendition at a time".into());
        }

        let thumb = &self.pipeline.thumbnail;
        if !(1..=100).contains(&thumb.jpeg_quality) {
            warnings.push(format!(
                "pipeline.thumbnail.jpeg_quality {} is outside 1..=100",
                thumb.jpeg_quality
            ));
        }
        if thumb.width == 0 || thumb.height == 0 {
            warnings.push("pipeline.thumbnail output size has a zero dimension".into());
        }
        if thumb.offset_secs < 0.0 {
            warnings.push("pipeline.thumbnail.offset_secs is negative; 0 will be used".into());
        }

        if self.pipeline.encode.frame_rate == 0 {
            warnings.push("pipeline.encode.frame_rate is 0".into());
        }

        if self.workers.max_concurrent_jobs == 0 {
            warnings.push("workers.max_concurrent_jobs is 0; jobs will run one at a time".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Where uploads, renditions, thumbnails and job snapshots live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    /// Defaults to `<upload_dir>/processed`.
    pub processed_dir: Option<PathBuf>,
    /// Defaults to `<upload_dir>/thumbnails`.
    pub thumbnail_dir: Option<PathBuf>,
    /// Defaults to `<upload_dir>/jobs`.
    pub jobs_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            processed_dir: None,
            thumbnail_dir: None,
            jobs_dir: None,
        }
    }
}

impl StorageConfig {
    pub fn processed_dir(&self) -> PathBuf {
        self.processed_dir
            .clone()
            .unwrap_or_else(|| self.upload_dir.join("processed"))
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.thumbnail_dir
            .clone()
            .unwrap_or_else(|| self.upload_dir.join("thumbnails"))
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.jobs_dir
            .clone()
            .unwrap_or_else(|| self.upload_dir.join("jobs"))
    }
}

/// Upload acceptance rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub max_file_size: u64,
    pub default_qualities: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            default_qualities: vec!["720p".into(), "480p".into(), "360p".into()],
        }
    }
}

/// How the renditions of a single job are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// One rendition at a time, with a cooldown in between.
    #[default]
    Sequential,
    /// Up to `n` renditions at once; results keep request order.
    BoundedParallel(usize),
}

impl ExecutionStrategy {
    /// Number of renditions that may be in flight at once.
    pub fn concurrency(self) -> usize {
        match self {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::BoundedParallel(n) => n.max(1),
        }
    }
}

/// Pipeline behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub execution: ExecutionStrategy,
    /// Pause between sequential renditions.
    pub cooldown_ms: u64,
    pub inspect_timeout_secs: u64,
    pub thumbnail: ThumbnailConfig,
    pub encode: EncodeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionStrategy::Sequential,
            cooldown_ms: 1000,
            inspect_timeout_secs: 60,
            thumbnail: ThumbnailConfig::default(),
            encode: EncodeConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_secs(self.inspect_timeout_secs)
    }
}

/// Preview image settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Seconds into the source; clamped to the last frame for short sources.
    pub offset_secs: f64,
    /// Size of the intermediate frame grab.
    pub grab_width: u32,
    pub grab_height: u32,
    /// Final cover-fit size.
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    pub timeout_secs: u64,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            offset_secs: 2.0,
            grab_width: 640,
            grab_height: 360,
            width: 320,
            height: 180,
            jpeg_quality: 80,
            timeout_secs: 120,
        }
    }
}

/// Rendition encoder settings shared by every preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub frame_rate: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub h264_profile: String,
    pub h264_level: String,
    pub timeout_secs: u64,
    /// Minimum spacing between progress reports.
    pub progress_interval_ms: u64,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            video_codec: "libx264".into(),
            audio_codec: "aac".into(),
            h264_profile: "high".into(),
            h264_level: "4.0".into(),
            timeout_secs: 86400,
            progress_interval_ms: 2000,
        }
    }
}

/// Job-level concurrency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub max_concurrent_jobs: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: (num_cpus::get() / 2).max(1),
        }
    }
}
