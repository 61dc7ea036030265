//! Media inspection backed by ffprobe.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into [`rf_core::MediaInfo`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use rf_core::{parse_frame_rate, AudioStream, Error, MediaInfo, VideoStream};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Extracts container and stream metadata from a source file.
///
/// Implementations are read-only: inspecting the same unmodified file twice
/// yields equal [`MediaInfo`].
#[async_trait]
pub trait MediaInspector: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Probe `path`.
    ///
    /// # Errors
    ///
    /// [`Error::Inspection`] when the file cannot be opened or carries no
    /// parseable container/stream metadata.
    async fn inspect(&self, path: &Path) -> rf_core::Result<MediaInfo>;
}

/// An inspector backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeInspector {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeInspector {
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }

    /// Build from a discovered registry.
    pub fn from_registry(tools: &ToolRegistry, timeout: Duration) -> rf_core::Result<Self> {
        let ffprobe = tools.require("ffprobe")?;
        Ok(Self::new(ffprobe.path.clone(), timeout))
    }
}

#[async_trait]
impl MediaInspector for FfprobeInspector {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn inspect(&self, path: &Path) -> rf_core::Result<MediaInfo> {
        if !path.is_file() {
            return Err(Error::Inspection(format!(
                "source not found: {}",
                path.display()
            )));
        }

        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(self.timeout);
        cmd.args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd
            .execute()
            .await
            .map_err(|e| Error::Inspection(format!("{}: {e}", path.display())))?;

        let info = parse_ffprobe_json(&output.stdout)?;
        tracing::debug!(
            "Inspected {}: {:.2}s {} ({} video, {} audio)",
            path.display(),
            info.duration_secs,
            info.format_name,
            info.video.is_some(),
            info.audio.is_some(),
        );
        Ok(info)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Map raw ffprobe JSON into [`MediaInfo`].
///
/// # Errors
///
/// [`Error::Inspection`] for malformed JSON or output that carries neither a
/// format section nor any streams.
pub fn parse_ffprobe_json(json: &str) -> rf_core::Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Inspection(format!("ffprobe JSON parse error: {e}")))?;

    let Some(format) = output.format else {
        return Err(Error::Inspection("no container metadata in ffprobe output".into()));
    };
    if output.streams.is_empty() && format.format_name.is_none() {
        return Err(Error::Inspection("no parseable streams in ffprobe output".into()));
    }

    let duration_secs = format
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .map(|s| VideoStream {
            codec: s.codec_name.clone().unwrap_or_default(),
            width: s.width.unwrap_or(0),
            height: s.height.unwrap_or(0),
            frame_rate: s.r_frame_rate.as_deref().map(parse_frame_rate).unwrap_or(0.0),
        });

    let audio = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .map(|s| AudioStream {
            codec: s.codec_name.clone().unwrap_or_default(),
            sample_rate: s
                .sample_rate
                .as_deref()
                .and_then(|r| r.parse().ok())
                .unwrap_or(0),
            channels: s.channels.unwrap_or(0),
        });

    Ok(MediaInfo {
        duration_secs,
        size: parse_u64(format.size.as_deref()),
        bitrate: parse_u64(format.bit_rate.as_deref()),
        format_name: format.format_name.unwrap_or_default(),
        video,
        audio,
    })
}

fn parse_u64(s: Option<&str>) -> u64 {
    s.and_then(|v| v.parse().ok()).unwrap_or(0)
}
