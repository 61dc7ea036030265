mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;

use rf_av::{
    FfmpegThumbnailer, FfprobeInspector, MediaInspector, ThumbnailExtractor, ThumbnailRequest,
    ToolRegistry,
};
use rf_core::config::{Config, ExecutionStrategy};
use rf_core::{JobId, MediaInfo, QualityId};
use rf_pipeline::{
    base_name_for, find_first_video, JobRunner, JobStatus, JobStore, JsonFileJobStore, Orchestrator,
    ProcessingJob, StatusSnapshot, UploadIntake, UploadRequest,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelforge=trace,rf_pipeline=trace,rf_av=debug,rf_core=debug".to_string()
        } else {
            "reelforge=info,rf_pipeline=info,rf_av=info,rf_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let mut config = Config::load_or_default(cli.config.as_deref());
    config.apply_env_overrides();

    match cli.command {
        Commands::Process {
            input,
            name,
            qualities,
            parallel,
            no_import,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(process(config, input, name, qualities, parallel, no_import))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&config, &file, json))
        }
        Commands::Thumbnail { input, output } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(extract_thumbnail(&config, &input, &output))
        }
        Commands::Status { job_id, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(show_status(&config, job_id.as_deref(), json))
        }
        Commands::Profiles => list_profiles(),
        Commands::CheckTools => check_tools(&config),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("reelforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn process(
    mut config: Config,
    input: Option<PathBuf>,
    name: Option<String>,
    qualities: Option<Vec<String>>,
    parallel: Option<usize>,
    no_import: bool,
) -> Result<()> {
    if let Some(n) = parallel {
        config.pipeline.execution = ExecutionStrategy::BoundedParallel(n);
    }

    let intake = UploadIntake::from_config(&config);
    let asset = match input {
        Some(path) if !no_import => intake
            .import(&path)
            .await
            .with_context(|| format!("Failed to import {}", path.display()))?,
        Some(path) => accept_in_place(&intake, &path)?,
        None => {
            let upload_dir = &config.storage.upload_dir;
            let path = find_first_video(upload_dir)
                .with_context(|| format!("Failed to read {}", upload_dir.display()))?
                .with_context(|| format!("No video files found in {}", upload_dir.display()))?;
            tracing::info!("Using first upload: {}", path.display());
            accept_in_place(&intake, &path)?
        }
    };

    let base_name = name.unwrap_or_else(|| base_name_for(&asset.path));
    let qualities = qualities.unwrap_or_else(|| config.intake.default_qualities.clone());

    let tools = ToolRegistry::discover(&config.tools);
    let store = Arc::new(
        JsonFileJobStore::open(config.storage.jobs_dir()).context("Failed to open job store")?,
    );
    let orchestrator = Arc::new(Orchestrator::from_config(&config, &tools, store)?);
    let runner = JobRunner::new(orchestrator, config.workers.max_concurrent_jobs);

    let id = runner.submit(asset, &base_name, qualities).await;
    println!("Job {id} queued");

    let job = tokio::select! {
        job = runner.wait(id) => job?,
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted, cancelling job...");
            runner.cancel(id);
            runner.wait(id).await?
        }
    };
    runner.shutdown().await;

    print_job(&job);
    if job.status == JobStatus::Failed {
        anyhow::bail!(
            "Job {id} failed: {}",
            job.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// Treat a file that is already in place as a declared upload.
fn accept_in_place(intake: &UploadIntake, path: &Path) -> Result<rf_core::SourceAsset> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Input file does not exist: {}", path.display()))?;
    let mime_type = rf_core::mime_for_path(path)
        .unwrap_or("application/octet-stream")
        .to_string();
    let asset = intake.accept(UploadRequest {
        path: path.to_path_buf(),
        original_name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        size: metadata.len(),
        mime_type,
    })?;
    Ok(asset)
}

fn print_job(job: &ProcessingJob) {
    println!();
    println!("Job: {}", job.id);
    println!("Status: {}", job.status);
    println!("Source: {}", job.source.path.display());
    if let Some(ref media) = job.media {
        print_media(media);
    }
    if let Some(ref thumb) = job.thumbnail {
        match (&thumb.output_path, &thumb.error) {
            (Some(path), _) if thumb.success => println!(
                "Thumbnail: {} at {:.2}s ({}ms)",
                path.display(),
                thumb.timestamp_secs,
                thumb.processing_time_ms
            ),
            (_, error) => println!("Thumbnail: failed ({})", error.as_deref().unwrap_or("unknown")),
        }
    }

    println!("\nRenditions: {}", job.renditions.len());
    for r in &job.renditions {
        if r.success {
            println!(
                "  ✓ {} {} {} -> {} ({} bytes, {}ms)",
                r.quality,
                r.resolution.as_deref().unwrap_or("-"),
                r.bitrate.as_deref().unwrap_or("-"),
                r.output_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                r.file_size.unwrap_or(0),
                r.processing_time_ms
            );
        } else {
            println!(
                "  ✗ {} [{}] {}",
                r.quality,
                r.error_kind.as_deref().unwrap_or("error"),
                r.error.as_deref().unwrap_or("")
            );
        }
    }

    println!(
        "\nTimings: analysis {}ms, thumbnail {}ms, renditions {}ms, total {}ms",
        job.timings.analysis_ms,
        job.timings.thumbnail_ms,
        job.timings.renditions_ms,
        job.total_processing_time_ms.unwrap_or(0)
    );
}

fn print_media(media: &MediaInfo) {
    println!("Container: {}", media.format_name);
    println!("Size: {} bytes", media.size);
    let secs = media.duration_secs as u64;
    println!(
        "Duration: {:02}:{:02}:{:02} ({:.2}s)",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        media.duration_secs
    );
    println!("Bitrate: {} bit/s", media.bitrate);
    if let Some(ref video) = media.video {
        println!(
            "Video: {} {}x{} {:.3} fps",
            video.codec, video.width, video.height, video.frame_rate
        );
    }
    if let Some(ref audio) = media.audio {
        println!(
            "Audio: {} {} Hz {}ch",
            audio.codec, audio.sample_rate, audio.channels
        );
    }
}

async fn probe_file(config: &Config, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let tools = ToolRegistry::discover(&config.tools);
    let inspector = FfprobeInspector::from_registry(&tools, config.pipeline.inspect_timeout())?;
    let media = inspector.inspect(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&media)?);
    } else {
        println!("File: {}", file.display());
        print_media(&media);
    }
    Ok(())
}

async fn extract_thumbnail(config: &Config, input: &Path, output: &Path) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let tools = ToolRegistry::discover(&config.tools);
    // Duration only sharpens the seek clamp; carry on without it.
    let media = match FfprobeInspector::from_registry(&tools, config.pipeline.inspect_timeout()) {
        Ok(inspector) => inspector.inspect(input).await.ok(),
        Err(_) => None,
    };

    let thumbnailer = FfmpegThumbnailer::from_registry(&tools, config.pipeline.thumbnail.clone())?;
    let request = ThumbnailRequest {
        source: input,
        output,
        duration_secs: media.as_ref().map(|m| m.duration_secs),
        frame_rate: media.as_ref().and_then(|m| m.video.as_ref()).map(|v| v.frame_rate),
    };
    let result = thumbnailer
        .extract(&request, &CancellationToken::new())
        .await?;

    println!(
        "Thumbnail written to {} (frame at {:.2}s, extract {}ms, resize {}ms)",
        output.display(),
        result.timestamp_secs,
        result.extract_ms,
        result.resize_ms
    );
    Ok(())
}

async fn show_status(config: &Config, job_id: Option<&str>, json: bool) -> Result<()> {
    let store = JsonFileJobStore::open(config.storage.jobs_dir()).context("Failed to open job store")?;

    let jobs: Vec<ProcessingJob> = match job_id {
        Some(raw) => {
            let id: JobId = raw
                .parse()
                .with_context(|| format!("Invalid job id: {raw}"))?;
            let job = store
                .load(id)
                .await?
                .with_context(|| format!("Job not found: {id}"))?;
            vec![job]
        }
        None => store.list().await?,
    };
    let snapshots: Vec<StatusSnapshot> = jobs.iter().map(ProcessingJob::snapshot).collect();

    if json {
        let out = if job_id.is_some() {
            serde_json::to_string_pretty(&snapshots[0])?
        } else {
            serde_json::to_string_pretty(&snapshots)?
        };
        println!("{out}");
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("No jobs found in {}", store.dir().display());
        return Ok(());
    }
    for s in &snapshots {
        print!(
            "{}  {:<10} {:>3}%  {}/{}  {}",
            s.job_id,
            s.status.as_str(),
            s.progress_percent,
            s.completed_qualities.len(),
            s.total_requested,
            s.base_name
        );
        if let Some(ms) = s.total_processing_time_ms {
            print!("  {ms}ms");
        }
        if let Some(ref error) = s.error_detail {
            print!("  ({error})");
        }
        println!();
    }
    Ok(())
}

fn list_profiles() -> Result<()> {
    println!("{:<6} {:>10} {:>8} {:>4}  {:<7} suffix", "id", "resolution", "bitrate", "crf", "preset");
    for id in QualityId::ALL {
        let p = id.profile();
        println!(
            "{:<6} {:>10} {:>8} {:>4}  {:<7} {}",
            id.as_str(),
            p.resolution(),
            p.bitrate(),
            p.crf,
            p.preset,
            p.suffix
        );
    }
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable processing.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::from_file(p)
                .with_context(|| format!("Failed to load config {}", p.display()))?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Upload dir: {}", config.storage.upload_dir.display());
    println!("  Processed dir: {}", config.storage.processed_dir().display());
    println!("  Thumbnail dir: {}", config.storage.thumbnail_dir().display());
    println!("  Max file size: {} bytes", config.intake.max_file_size);
    println!("  Default qualities: {}", config.intake.default_qualities.join(","));
    println!("  Execution: {:?}", config.pipeline.execution);
    println!("  Max concurrent jobs: {}", config.workers.max_concurrent_jobs);

    for warning in config.validate() {
        println!("  ⚠ {warning}");
    }
    Ok(())
}
