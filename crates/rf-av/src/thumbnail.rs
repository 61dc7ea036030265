//! Preview image extraction.
//!
//! Two stages, timed separately: ffmpeg seeks and decodes one frame into an
//! intermediate PNG, then the `image` crate cover-fits it to the output size
//! and recompresses it as JPEG. The intermediate lives in a [`Workspace`] and
//! is removed on every exit path.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tokio_util::sync::CancellationToken;

use rf_core::config::ThumbnailConfig;
use rf_core::{elapsed_ms, Error, ThumbnailResult};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;
use crate::workspace::Workspace;

/// Frame spacing assumed when the source reports no frame rate.
const FALLBACK_FRAME_SECS: f64 = 0.1;

/// Inputs for one thumbnail extraction.
#[derive(Debug, Clone)]
pub struct ThumbnailRequest<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    /// Source duration, used to clamp the seek offset.
    pub duration_secs: Option<f64>,
    pub frame_rate: Option<f64>,
}

/// Produces a compressed preview still from a source video.
#[async_trait]
pub trait ThumbnailExtractor: Send + Sync {
    /// # Errors
    ///
    /// [`Error::Thumbnail`] if frame extraction or recompression fails,
    /// [`Error::Cancelled`] if `cancel` fired first.
    async fn extract(
        &self,
        request: &ThumbnailRequest<'_>,
        cancel: &CancellationToken,
    ) -> rf_core::Result<ThumbnailResult>;
}

/// Seek offset clamped to the last decodable frame of a short source.
pub fn clamp_offset(offset_secs: f64, duration_secs: Option<f64>, frame_rate: Option<f64>) -> f64 {
    let offset = offset_secs.max(0.0);
    match duration_secs {
        Some(duration) if duration > 0.0 => {
            let frame_secs = frame_rate
                .filter(|fps| *fps > 0.0)
                .map(|fps| 1.0 / fps)
                .unwrap_or(FALLBACK_FRAME_SECS);
            offset.min((duration - frame_secs).max(0.0))
        }
        _ => offset,
    }
}

/// Decode `input`, cover-fit it to `width`x`height` (center crop) and write
/// a JPEG at `quality` to `output`.
pub fn resize_to_jpeg(
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
    quality: u8,
) -> rf_core::Result<()> {
    let img = image::open(input)
        .map_err(|e| Error::Thumbnail(format!("failed to decode frame: {e}")))?;
    let thumb = img.resize_to_fill(width, height, FilterType::Lanczos3);
    let rgb = DynamicImage::ImageRgb8(thumb.to_rgb8());

    let write = || -> rf_core::Result<()> {
        let file = std::fs::File::create(output)?;
        let mut writer = std::io::BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)
            .map_err(|e| Error::Thumbnail(format!("failed to encode JPEG: {e}")))?;
        Ok(())
    };

    write().inspect_err(|_| {
        let _ = std::fs::remove_file(output);
    })
}

/// ffmpeg + `image` implementation of [`ThumbnailExtractor`].
#[derive(Debug, Clone)]
pub struct FfmpegThumbnailer {
    ffmpeg_path: PathBuf,
    config: ThumbnailConfig,
}

impl FfmpegThumbnailer {
    pub fn new(ffmpeg_path: PathBuf, config: ThumbnailConfig) -> Self {
        Self {
            ffmpeg_path,
            config,
        }
    }

    pub fn from_registry(tools: &ToolRegistry, config: ThumbnailConfig) -> rf_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?;
        Ok(Self::new(ffmpeg.path.clone(), config))
    }

    async fn grab_frame(
        &self,
        source: &Path,
        frame: &Path,
        offset_secs: f64,
        cancel: &CancellationToken,
    ) -> rf_core::Result<()> {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.timeout(Duration::from_secs(self.config.timeout_secs));
        cmd.args(["-y", "-v", "error", "-ss"]);
        cmd.arg(format!("{offset_secs:.3}"));
        cmd.arg("-i");
        cmd.arg(source.to_string_lossy().as_ref());
        cmd.args(["-frames:v", "1", "-vf"]);
        cmd.arg(format!(
            "scale={}:{}",
            self.config.grab_width, self.config.grab_height
        ));
        cmd.arg(frame.to_string_lossy().as_ref());

        cmd.execute_with_stderr_callback(|_| {}, Some(cancel.clone()))
            .await?;

        // Seeking past the last frame exits 0 without writing anything.
        if !frame.exists() {
            return Err(Error::Thumbnail(format!(
                "no frame decoded at {offset_secs:.3}s"
            )));
        }
        Ok(())
    }

    async fn run(
        &self,
        request: &ThumbnailRequest<'_>,
        cancel: &CancellationToken,
    ) -> rf_core::Result<ThumbnailResult> {
        let started = Instant::now();
        let output_dir = request
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let workspace = Workspace::new_in(output_dir)?;

        let stem = request
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "thumb".to_string());
        let frame = workspace.temp_file(&format!("{stem}_temp.png"));

        let mut offset = clamp_offset(
            self.config.offset_secs,
            request.duration_secs,
            request.frame_rate,
        );

        if let Err(e) = self.grab_frame(request.source, &frame, offset, cancel).await {
            if matches!(e, Error::Cancelled) || offset == 0.0 {
                return Err(e);
            }
            tracing::warn!(
                "Frame grab at {offset:.3}s failed for {} ({e}); retrying at first frame",
                request.source.display()
            );
            offset = 0.0;
            self.grab_frame(request.source, &frame, offset, cancel).await?;
        }
        let extract_time = started.elapsed();

        let resize_started = Instant::now();
        let (width, height, quality) = (
            self.config.width,
            self.config.height,
            self.config.jpeg_quality,
        );
        let output = request.output.to_path_buf();
        let frame_path = frame.clone();
        tokio::task::spawn_blocking(move || {
            resize_to_jpeg(&frame_path, &output, width, height, quality)
        })
        .await
        .map_err(|e| Error::Thumbnail(format!("resize task failed: {e}")))??;
        let resize_time = resize_started.elapsed();

        drop(workspace);

        Ok(ThumbnailResult {
            output_path: Some(request.output.to_path_buf()),
            timestamp_secs: offset,
            extract_ms: elapsed_ms(extract_time),
            resize_ms: elapsed_ms(resize_time),
            processing_time_ms: elapsed_ms(started.elapsed()),
            success: true,
            error: None,
        })
    }
}

#[async_trait]
impl ThumbnailExtractor for FfmpegThumbnailer {
    async fn extract(
        &self,
        request: &ThumbnailRequest<'_>,
        cancel: &CancellationToken,
    ) -> rf_core::Result<ThumbnailResult> {
        self.run(request, cancel).await.map_err(|e| match e {
            Error::Thumbnail(_) | Error::Cancelled => e,
            other => Error::Thumbnail(other.to_string()),
        })
    }
}
