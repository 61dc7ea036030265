//! Unified error type for the reelforge pipeline.
//!
//! All crates funnel their failures into [`Error`]. The pipeline stages map
//! onto dedicated variants so a recorded failure keeps its taxonomy via
//! [`Error::kind`].

use std::fmt;

/// Unified error type covering all failure modes in reelforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "job", "source").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The source could not be opened or carries no parseable metadata.
    #[error("Inspection error: {0}")]
    Inspection(String),

    /// Frame extraction or recompression of the preview image failed.
    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    /// Encoding one quality failed.
    #[error("Rendition error [{quality}]: {message}")]
    Rendition {
        /// Quality identifier that was being encoded.
        quality: String,
        /// Human-readable error description.
        message: String,
    },

    /// The caller asked for a quality identifier with no preset.
    #[error("Unknown preset: {0}")]
    UnknownQuality(String),

    /// Work was abandoned because its cancellation token fired.
    #[error("cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short taxonomy label, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Validation(_) => "validation",
            Error::Io { .. } => "io",
            Error::Tool { .. } => "tool",
            Error::Inspection(_) => "inspection",
            Error::Thumbnail(_) => "thumbnail",
            Error::Rendition { .. } => "rendition",
            Error::UnknownQuality(_) => "unknown_quality",
            Error::Cancelled => "cancelled",
            Error::Internal(_) => "internal",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Rendition`].
    pub fn rendition(quality: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Rendition {
            quality: quality.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("job", "abc-123");
        assert_eq!(err.to_string(), "job not found: abc-123");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
    }

    #[test]
    fn rendition_display() {
        let err = Error::rendition("720p", "encoder crashed");
        assert_eq!(err.to_string(), "Rendition error [720p]: encoder crashed");
        assert_eq!(err.kind(), "rendition");
    }

    #[test]
    fn unknown_quality_display() {
        let err = Error::UnknownQuality("bogus".into());
        assert_eq!(err.to_string(), "Unknown preset: bogus");
        assert_eq!(err.kind(), "unknown_quality");
    }

    #[test]
    fn stage_kinds_are_distinct() {
        assert_eq!(Error::Inspection("x".into()).kind(), "inspection");
        assert_eq!(Error::Thumbnail("x".into()).kind(), "thumbnail");
        assert_eq!(Error::Cancelled.kind(), "cancelled");
    }
}
