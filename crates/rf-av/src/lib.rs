//! # rf-av
//!
//! Media tooling for the reelforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- locate ffmpeg and ffprobe from
//!   configuration or `PATH`.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   cancellation and line-by-line stderr streaming.
//! - **Inspection** ([`MediaInspector`], [`FfprobeInspector`]) -- container
//!   and stream metadata.
//! - **Thumbnails** ([`ThumbnailExtractor`], [`FfmpegThumbnailer`]) -- frame
//!   grab plus cover-fit JPEG recompression.
//! - **Renditions** ([`RenditionEncoder`], [`FfmpegEncoder`]) -- H.264/AAC
//!   MP4 encodes with progress reporting.

pub mod command;
pub mod encode;
pub mod inspect;
pub mod progress;
pub mod thumbnail;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use encode::{build_encode_args, EncodeRequest, FfmpegEncoder, RenditionEncoder};
pub use inspect::{parse_ffprobe_json, FfprobeInspector, MediaInspector};
pub use progress::{EncodeProgress, ProgressParser, ProgressSender};
pub use thumbnail::{clamp_offset, FfmpegThumbnailer, ThumbnailExtractor, ThumbnailRequest};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::Workspace;
