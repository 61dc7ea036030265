//! Media-domain data model shared by the inspector, the stage
//! implementations and the orchestrator.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::quality::QualityProfile;
use crate::Error;

/// Container extensions accepted for ingestion, with their MIME types.
pub const SUPPORTED_CONTAINERS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
];

/// MIME type for a supported video extension (case-insensitive).
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    SUPPORTED_CONTAINERS
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
}

/// Whole milliseconds in `d`, saturating.
pub fn elapsed_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Convert an ffprobe rational (`"30000/1001"`) or plain number into a
/// decimal rate. Zero or malformed denominators yield `0.0`, as do negative
/// or non-finite results.
pub fn parse_frame_rate(s: &str) -> f64 {
    let value = match s.trim().split_once('/') {
        Some((num, den)) => {
            let (Ok(num), Ok(den)) = (num.trim().parse::<f64>(), den.trim().parse::<f64>())
            else {
                return 0.0;
            };
            if den == 0.0 {
                return 0.0;
            }
            num / den
        }
        None => s.trim().parse::<f64>().unwrap_or(0.0),
    };

    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// SourceAsset
// ---------------------------------------------------------------------------

/// An accepted upload. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAsset {
    pub path: PathBuf,
    pub original_name: String,
    /// Declared size in bytes.
    pub size: u64,
    pub mime_type: String,
}

impl SourceAsset {
    /// Describe a local file, inferring name, size and MIME type.
    ///
    /// A missing file yields size 0; the inspector reports the real problem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let mime_type = mime_for_path(&path)
            .unwrap_or("application/octet-stream")
            .to_string();

        Self {
            path,
            original_name,
            size,
            mime_type,
        }
    }
}

// ---------------------------------------------------------------------------
// MediaInfo
// ---------------------------------------------------------------------------

/// Read-only metadata snapshot produced once per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds (fractional, never negative).
    pub duration_secs: f64,
    /// File size in bytes as reported by the demuxer.
    pub size: u64,
    /// Overall bitrate in bit/s.
    pub bitrate: u64,
    /// Container format name, e.g. `mov,mp4,m4a,3gp,3g2,mj2`.
    pub format_name: String,
    pub video: Option<VideoStream>,
    pub audio: Option<AudioStream>,
}

/// First video stream of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Decimal frames per second; 0 when the container reports none.
    pub frame_rate: f64,
}

/// First audio stream of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
}

// ---------------------------------------------------------------------------
// Stage results
// ---------------------------------------------------------------------------

/// Outcome of encoding one requested quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionResult {
    /// Identifier as requested by the caller.
    pub quality: String,
    pub output_path: Option<PathBuf>,
    pub resolution: Option<String>,
    pub bitrate: Option<String>,
    pub file_size: Option<u64>,
    pub processing_time_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    /// Taxonomy label from [`Error::kind`] when the rendition failed.
    pub error_kind: Option<String>,
}

impl RenditionResult {
    /// A finished rendition.
    pub fn succeeded(
        profile: &QualityProfile,
        output_path: PathBuf,
        file_size: u64,
        elapsed: Duration,
    ) -> Self {
        Self {
            quality: profile.id.to_string(),
            output_path: Some(output_path),
            resolution: Some(profile.resolution()),
            bitrate: Some(profile.bitrate()),
            file_size: Some(file_size),
            processing_time_ms: elapsed_ms(elapsed),
            success: true,
            error: None,
            error_kind: None,
        }
    }

    /// A failed attempt at `quality`.
    pub fn failed(quality: impl Into<String>, error: &Error, elapsed: Duration) -> Self {
        Self {
            quality: quality.into(),
            output_path: None,
            resolution: None,
            bitrate: None,
            file_size: None,
            processing_time_ms: elapsed_ms(elapsed),
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
        }
    }

    /// Whether the rendition can be served.
    pub fn is_ready(&self) -> bool {
        self.success
    }
}

/// Outcome of the preview image stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailResult {
    pub output_path: Option<PathBuf>,
    /// Offset the frame was taken from, after clamping to the source length.
    pub timestamp_secs: f64,
    /// Seek + decode stage.
    pub extract_ms: u64,
    /// Resize + recompress stage.
    pub resize_ms: u64,
    pub processing_time_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl ThumbnailResult {
    /// Record a thumbnail failure without aborting the job.
    pub fn failed(error: &Error, elapsed: Duration) -> Self {
        Self {
            output_path: None,
            timestamp_secs: 0.0,
            extract_ms: 0,
            resize_ms: 0,
            processing_time_ms: elapsed_ms(elapsed),
            success: false,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityId;

    #[test]
    fn frame_rate_fractions() {
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25/1"), 25.0);
        assert_eq!(parse_frame_rate("24"), 24.0);
    }

    #[test]
    fn frame_rate_never_raises() {
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert_eq!(parse_frame_rate("30/0"), 0.0);
        assert_eq!(parse_frame_rate("30/abc"), 0.0);
        assert_eq!(parse_frame_rate(""), 0.0);
        assert_eq!(parse_frame_rate("N/A"), 0.0);
        assert_eq!(parse_frame_rate("-30/1"), 0.0);
    }

    #[test]
    fn mime_inference() {
        assert_eq!(mime_for_path(Path::new("a/b.MP4")), Some("video/mp4"));
        assert_eq!(mime_for_path(Path::new("clip.mkv")), Some("video/x-matroska"));
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_for_path(Path::new("noext")), None);
    }

    #[test]
    fn source_asset_from_missing_path() {
        let asset = SourceAsset::from_path("/definitely/not/here.mov");
        assert_eq!(asset.original_name, "here.mov");
        assert_eq!(asset.size, 0);
        assert_eq!(asset.mime_type, "video/quicktime");
    }

    #[test]
    fn rendition_result_constructors() {
        let ok = RenditionResult::succeeded(
            QualityId::P480.profile(),
            PathBuf::from("/out/a_480p.mp4"),
            1024,
            Duration::from_millis(1500),
        );
        assert!(ok.is_ready());
        assert_eq!(ok.quality, "480p");
        assert_eq!(ok.resolution.as_deref(), Some("854x480"));
        assert_eq!(ok.processing_time_ms, 1500);

        let err = Error::UnknownQuality("bogus".into());
        let failed = RenditionResult::failed("bogus", &err, Duration::ZERO);
        assert!(!failed.is_ready());
        assert_eq!(failed.error_kind.as_deref(), Some("unknown_quality"));
        assert_eq!(failed.error.as_deref(), Some("Unknown preset: bogus"));
    }
}
