use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelforge")]
#[command(author, version, about = "Video ingestion and multi-quality transcoding pipeline")]
pub struct Cli {
    /// Path to config file (JSON or TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a video through inspection, thumbnail and rendition encoding
    Process {
        /// Source video (defaults to the first video in the upload directory)
        input: Option<PathBuf>,

        /// Base name for output files (defaults to the stored upload name)
        #[arg(short, long)]
        name: Option<String>,

        /// Comma-separated quality identifiers, e.g. 720p,480p,360p
        #[arg(short, long, value_delimiter = ',')]
        qualities: Option<Vec<String>>,

        /// Encode up to N renditions at once instead of sequentially
        #[arg(long)]
        parallel: Option<usize>,

        /// Process the input in place instead of importing it into the upload directory
        #[arg(long)]
        no_import: bool,
    },

    /// Inspect a video file and display its metadata
    Probe {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract a preview thumbnail from a video
    Thumbnail {
        /// Source video
        input: PathBuf,

        /// Output JPEG path
        output: PathBuf,
    },

    /// Show stored job status
    Status {
        /// Job id (lists all jobs if omitted)
        job_id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the built-in quality presets
    Profiles,

    /// Check that ffmpeg and ffprobe are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config or defaults if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
