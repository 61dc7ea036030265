//! Rendition encoding (H.264/AAC MP4) using ffmpeg.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use rf_core::config::EncodeConfig;
use rf_core::{Error, QualityProfile, RenditionResult};

use crate::command::ToolCommand;
use crate::progress::{ProgressParser, ProgressSender};
use crate::tools::ToolRegistry;

/// Inputs for one rendition encode.
#[derive(Debug, Clone)]
pub struct EncodeRequest<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub profile: &'static QualityProfile,
    /// Source duration, used to turn encoder timestamps into percentages.
    pub duration_secs: Option<f64>,
}

/// Transforms a source into one target quality.
///
/// Never fails: any encoder error comes back as a [`RenditionResult`] with
/// `success == false`.
#[async_trait]
pub trait RenditionEncoder: Send + Sync {
    async fn encode(
        &self,
        request: &EncodeRequest<'_>,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> RenditionResult;
}

/// ffmpeg arguments for encoding `input` under `profile`.
pub fn build_encode_args(
    input: &Path,
    output: &Path,
    profile: &QualityProfile,
    config: &EncodeConfig,
) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-progress", "pipe:2", "-nostats", "-i"]
        .into_iter()
        .map(String::from)
        .collect();
    args.push(input.to_string_lossy().to_string());
    args.extend([
        "-c:v".to_string(),
        config.video_codec.clone(),
        "-b:v".to_string(),
        profile.bitrate(),
        "-s".to_string(),
        profile.resolution(),
        "-r".to_string(),
        config.frame_rate.to_string(),
        "-preset".to_string(),
        profile.preset.to_string(),
        "-crf".to_string(),
        profile.crf.to_string(),
        "-profile:v".to_string(),
        config.h264_profile.clone(),
        "-level".to_string(),
        config.h264_level.clone(),
        "-c:a".to_string(),
        config.audio_codec.clone(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]);
    args.push(output.to_string_lossy().to_string());
    args
}

/// ffmpeg implementation of [`RenditionEncoder`].
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
    config: EncodeConfig,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: PathBuf, config: EncodeConfig) -> Self {
        Self {
            ffmpeg_path,
            config,
        }
    }

    pub fn from_registry(tools: &ToolRegistry, config: EncodeConfig) -> rf_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?;
        Ok(Self::new(ffmpeg.path.clone(), config))
    }

    async fn run(
        &self,
        request: &EncodeRequest<'_>,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> rf_core::Result<u64> {
        let profile = request.profile;
        let quality = profile.id.as_str();

        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::info!(
            "Encode {}: {:?} -> {:?} (size={}, bitrate={}, crf={}, preset={})",
            quality,
            request.source,
            request.output,
            profile.resolution(),
            profile.bitrate(),
            profile.crf,
            profile.preset,
        );

        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.timeout(Duration::from_secs(self.config.timeout_secs));
        cmd.args(build_encode_args(
            request.source,
            request.output,
            profile,
            &self.config,
        ));

        let interval = Duration::from_millis(self.config.progress_interval_ms);
        let mut parser = ProgressParser::new(request.duration_secs);
        let mut last_report: Option<Instant> = None;

        let result = cmd
            .execute_with_stderr_callback(
                |line| {
                    let Some(p) = parser.feed(line) else {
                        return;
                    };
                    let due = last_report.map_or(true, |t| t.elapsed() >= interval);
                    if due || p.finished {
                        tracing::debug!(
                            quality,
                            fps = ?p.fps,
                            speed = ?p.speed,
                            frame = ?p.frame,
                            eta_secs = ?request.duration_secs.and_then(|d| p.eta_secs(d)),
                            "encode progress {:.1}%",
                            p.percent()
                        );
                        progress.send(p.percent(), quality);
                        last_report = Some(Instant::now());
                    }
                },
                Some(cancel.clone()),
            )
            .await;

        if let Err(e) = result {
            // Never leave a truncated rendition behind.
            let _ = tokio::fs::remove_file(request.output).await;
            return Err(match e {
                Error::Cancelled => Error::Cancelled,
                other => Error::rendition(quality, other.to_string()),
            });
        }

        let size = tokio::fs::metadata(request.output)
            .await
            .map_err(|e| Error::rendition(quality, format!("output missing after encode: {e}")))?
            .len();
        Ok(size)
    }
}

#[async_trait]
impl RenditionEncoder for FfmpegEncoder {
    async fn encode(
        &self,
        request: &EncodeRequest<'_>,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> RenditionResult {
        let started = Instant::now();
        match self.run(request, progress, cancel).await {
            Ok(size) => RenditionResult::succeeded(
                request.profile,
                request.output.to_path_buf(),
                size,
                started.elapsed(),
            ),
            Err(e) => {
                tracing::warn!("Encode {} failed: {e}", request.profile.id);
                RenditionResult::failed(request.profile.id.as_str(), &e, started.elapsed())
            }
        }
    }
}
