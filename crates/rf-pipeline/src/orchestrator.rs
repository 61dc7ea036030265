//! Pipeline orchestrator: inspect, thumbnail, then one encode per requested
//! quality.
//!
//! Only inspection failure aborts a job. Thumbnail and rendition failures are
//! recorded on the job and the run continues. Every intermediate state is
//! published to a `watch` channel (single writer, many readers) and handed to
//! the [`JobStore`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use rf_av::{
    EncodeRequest, FfmpegEncoder, FfmpegThumbnailer, FfprobeInspector, MediaInspector,
    ProgressSender, RenditionEncoder, ThumbnailExtractor, ThumbnailRequest, ToolRegistry,
};
use rf_core::config::{Config, ExecutionStrategy};
use rf_core::events::{EventBus, EventPayload};
use rf_core::{
    elapsed_ms, quality, Error, JobId, QualityProfile, RenditionResult, SourceAsset,
    ThumbnailResult,
};

use crate::job::ProcessingJob;
use crate::store::JobStore;

/// Error detail recorded on a job stopped through its cancellation token.
pub const CANCELLED_DETAIL: &str = "job cancelled";

/// Where outputs go and how renditions are scheduled.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub processed_dir: PathBuf,
    pub thumbnail_dir: PathBuf,
    pub execution: ExecutionStrategy,
    /// Pause between sequential renditions.
    pub cooldown: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            processed_dir: config.storage.processed_dir(),
            thumbnail_dir: config.storage.thumbnail_dir(),
            execution: config.pipeline.execution,
            cooldown: config.pipeline.cooldown(),
        }
    }

    pub fn thumbnail_path(&self, base_name: &str) -> PathBuf {
        self.thumbnail_dir.join(format!("thumb_{base_name}.jpg"))
    }
}

pub struct Orchestrator {
    inspector: Arc<dyn MediaInspector>,
    thumbnailer: Arc<dyn ThumbnailExtractor>,
    encoder: Arc<dyn RenditionEncoder>,
    store: Arc<dyn JobStore>,
    events: Arc<EventBus>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        inspector: Arc<dyn MediaInspector>,
        thumbnailer: Arc<dyn ThumbnailExtractor>,
        encoder: Arc<dyn RenditionEncoder>,
        store: Arc<dyn JobStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            inspector,
            thumbnailer,
            encoder,
            store,
            events: Arc::new(EventBus::default()),
            settings,
        }
    }

    /// Wire the ffmpeg-backed stages from configuration.
    pub fn from_config(
        config: &Config,
        tools: &ToolRegistry,
        store: Arc<dyn JobStore>,
    ) -> rf_core::Result<Self> {
        let inspector = FfprobeInspector::from_registry(tools, config.pipeline.inspect_timeout())?;
        let thumbnailer = FfmpegThumbnailer::from_registry(tools, config.pipeline.thumbnail.clone())?;
        let encoder = FfmpegEncoder::from_registry(tools, config.pipeline.encode.clone())?;
        Ok(Self::new(
            Arc::new(inspector),
            Arc::new(thumbnailer),
            Arc::new(encoder),
            store,
            OrchestratorSettings::from_config(config),
        ))
    }

    /// Share an existing event bus instead of the private default one.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Run a fresh job to completion and return its terminal state.
    pub async fn run(
        &self,
        source: SourceAsset,
        base_name: &str,
        qualities: Vec<String>,
    ) -> ProcessingJob {
        let job = ProcessingJob::new(source, base_name, qualities);
        let (tx, _rx) = watch::channel(job.clone());
        self.run_job(job, &tx, &CancellationToken::new()).await
    }

    /// Drive `job` through every stage, publishing each intermediate state.
    ///
    /// Always returns a terminal job.
    pub async fn run_job(
        &self,
        mut job: ProcessingJob,
        publish: &watch::Sender<ProcessingJob>,
        cancel: &CancellationToken,
    ) -> ProcessingJob {
        let started = Instant::now();
        let job_id = job.id;

        job.start();
        self.publish(&job, publish).await;
        self.events.broadcast(EventPayload::JobStarted { job_id });
        tracing::info!(
            job_id = %job_id,
            source = %job.source.path.display(),
            "Processing started ({} qualities)",
            job.requested.len()
        );

        // ---- Inspection ----
        let inspect_started = Instant::now();
        let inspected = if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            tokio::select! {
                r = self.inspector.inspect(&job.source.path) => r,
                _ = cancel.cancelled() => Err(Error::Cancelled),
            }
        };
        let media = match inspected {
            Ok(media) => media,
            Err(Error::Cancelled) => return self.cancel_remaining(job, publish, started).await,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Inspection failed");
                job.fail(e.to_string(), started.elapsed());
                self.publish(&job, publish).await;
                self.events.broadcast(EventPayload::JobFailed {
                    job_id,
                    error: e.to_string(),
                });
                return job;
            }
        };
        tracing::info!(
            job_id = %job_id,
            "Inspected: {:.2}s {}",
            media.duration_secs,
            media.format_name
        );
        self.events.broadcast(EventPayload::InspectionFinished {
            job_id,
            duration_secs: media.duration_secs,
        });
        let duration_secs = Some(media.duration_secs).filter(|d| *d > 0.0);
        let frame_rate = media.video.as_ref().map(|v| v.frame_rate);
        job.record_media(media, inspect_started.elapsed());
        self.publish(&job, publish).await;

        // ---- Thumbnail (best effort) ----
        if cancel.is_cancelled() {
            return self.cancel_remaining(job, publish, started).await;
        }
        let thumb_started = Instant::now();
        let thumb_path = self.settings.thumbnail_path(&job.base_name);
        let request = ThumbnailRequest {
            source: &job.source.path,
            output: &thumb_path,
            duration_secs,
            frame_rate,
        };
        let thumbnail = match self.thumbnailer.extract(&request, cancel).await {
            Ok(result) => result,
            Err(Error::Cancelled) => return self.cancel_remaining(job, publish, started).await,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Thumbnail failed, continuing");
                ThumbnailResult::failed(&e, thumb_started.elapsed())
            }
        };
        self.events.broadcast(EventPayload::ThumbnailFinished {
            job_id,
            success: thumbnail.success,
        });
        job.record_thumbnail(thumbnail);
        self.publish(&job, publish).await;

        // ---- Renditions ----
        let renditions_started = Instant::now();
        self.run_renditions(&mut job, duration_secs, publish, cancel)
            .await;
        job.timings.renditions_ms = elapsed_ms(renditions_started.elapsed());

        // A cancel that lands after the last encode leaves nothing cut short.
        let cut_short = job
            .renditions
            .iter()
            .any(|r| r.error_kind.as_deref() == Some(Error::Cancelled.kind()));
        if cut_short {
            tracing::info!(job_id = %job_id, "Job cancelled");
            job.fail(CANCELLED_DETAIL, started.elapsed());
        } else {
            job.finish(started.elapsed());
        }
        self.publish(&job, publish).await;
        self.announce_terminal(&job);
        job
    }

    async fn run_renditions(
        &self,
        job: &mut ProcessingJob,
        duration_secs: Option<f64>,
        publish: &watch::Sender<ProcessingJob>,
        cancel: &CancellationToken,
    ) {
        let requested = job.requested.clone();
        let base_name = job.base_name.clone();
        let source = job.source.path.clone();
        let job_id = job.id;
        let total = requested.len();
        let plan = plan_renditions(&requested);

        match self.settings.execution {
            ExecutionStrategy::Sequential => {
                for (i, (quality, planned)) in requested.iter().zip(plan).enumerate() {
                    let result = self
                        .render_one(
                            job_id,
                            quality,
                            planned,
                            &base_name,
                            &source,
                            duration_secs,
                            cancel,
                        )
                        .await;
                    self.record_rendition(job, result, total, publish).await;

                    let last = i + 1 == total;
                    if !last && !cancel.is_cancelled() && !self.settings.cooldown.is_zero() {
                        tokio::select! {
                            _ = tokio::time::sleep(self.settings.cooldown) => {}
                            _ = cancel.cancelled() => {}
                        }
                    }
                }
            }
            ExecutionStrategy::BoundedParallel(_) => {
                let limit = self.settings.execution.concurrency();
                // Built up front so the stream owns boxed futures and the
                // whole job future stays `Send` for the worker task.
                let encodes: Vec<BoxFuture<'_, RenditionResult>> = requested
                    .iter()
                    .zip(plan)
                    .map(|(quality, planned)| {
                        self.render_one(
                            job_id,
                            quality,
                            planned,
                            &base_name,
                            &source,
                            duration_secs,
                            cancel,
                        )
                        .boxed()
                    })
                    .collect();
                // `buffered` yields in submission order, so the rendition
                // list keeps request order regardless of finish times.
                let mut results = futures::stream::iter(encodes).buffered(limit);
                while let Some(result) = results.next().await {
                    self.record_rendition(job, result, total, publish).await;
                }
            }
        }
    }

    async fn record_rendition(
        &self,
        job: &mut ProcessingJob,
        result: RenditionResult,
        total: usize,
        publish: &watch::Sender<ProcessingJob>,
    ) {
        self.events.broadcast(EventPayload::RenditionFinished {
            job_id: job.id,
            quality: result.quality.clone(),
            success: result.success,
        });
        let quality = result.quality.clone();
        let success = result.success;
        job.push_rendition(result);

        let pct = job.renditions.len() as f32 / total.max(1) as f32 * 100.0;
        tracing::info!(
            job_id = %job.id,
            "[{:.0}%] {} {}",
            pct,
            quality,
            if success { "ready" } else { "failed" }
        );
        self.publish(job, publish).await;
    }

    /// Encode one requested identifier. Never fails: every problem becomes a
    /// failed [`RenditionResult`].
    #[allow(clippy::too_many_arguments)]
    async fn render_one(
        &self,
        job_id: JobId,
        requested: &str,
        planned: rf_core::Result<&'static QualityProfile>,
        base_name: &str,
        source: &Path,
        duration_secs: Option<f64>,
        cancel: &CancellationToken,
    ) -> RenditionResult {
        if cancel.is_cancelled() {
            return RenditionResult::failed(requested, &Error::Cancelled, Duration::ZERO);
        }

        let profile = match planned {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(job_id = %job_id, "Skipping quality: {e}");
                return RenditionResult::failed(requested, &e, Duration::ZERO);
            }
        };

        let output = self
            .settings
            .processed_dir
            .join(profile.output_file_name(base_name));
        let resolution = profile.resolution();
        let events = self.events.clone();
        let progress = ProgressSender::new(move |pct, step| {
            tracing::info!(job_id = %job_id, "Processing {resolution}: {pct:.0}% complete");
            events.broadcast(EventPayload::RenditionProgress {
                job_id,
                quality: step.to_string(),
                progress: pct,
            });
        });

        let request = EncodeRequest {
            source,
            output: &output,
            profile,
            duration_secs,
        };
        self.encoder.encode(&request, &progress, cancel).await
    }

    /// Terminal state for a job cancelled before its renditions ran.
    async fn cancel_remaining(
        &self,
        mut job: ProcessingJob,
        publish: &watch::Sender<ProcessingJob>,
        started: Instant,
    ) -> ProcessingJob {
        tracing::info!(job_id = %job.id, "Job cancelled");
        let done = job.renditions.len();
        let remaining: Vec<String> = job.requested.iter().skip(done).cloned().collect();
        for quality in remaining {
            job.push_rendition(RenditionResult::failed(quality, &Error::Cancelled, Duration::ZERO));
        }
        job.fail(CANCELLED_DETAIL, started.elapsed());
        self.publish(&job, publish).await;
        self.announce_terminal(&job);
        job
    }

    fn announce_terminal(&self, job: &ProcessingJob) {
        let snapshot = job.snapshot();
        match &job.error {
            None => {
                tracing::info!(
                    job_id = %job.id,
                    "Job completed: {}/{} renditions ready in {}ms",
                    snapshot.completed_qualities.len(),
                    snapshot.total_requested,
                    snapshot.total_processing_time_ms.unwrap_or(0)
                );
                self.events.broadcast(EventPayload::JobCompleted {
                    job_id: job.id,
                    completed: snapshot.completed_qualities.len(),
                    total: snapshot.total_requested,
                });
            }
            Some(error) => {
                tracing::error!(job_id = %job.id, error = %error, "Job failed");
                self.events.broadcast(EventPayload::JobFailed {
                    job_id: job.id,
                    error: error.clone(),
                });
            }
        }
    }

    /// Make `job` visible to status readers and the persistence collaborator.
    async fn publish(&self, job: &ProcessingJob, publish: &watch::Sender<ProcessingJob>) {
        publish.send_replace(job.clone());
        if let Err(e) = self.store.save(job).await {
            tracing::warn!(job_id = %job.id, "Failed to persist job snapshot: {e}");
        }
    }
}

/// Resolve every requested identifier up front. Identifiers that name a
/// preset already claimed earlier in the list would write the same output
/// file, so they are rejected.
pub(crate) fn plan_renditions(requested: &[String]) -> Vec<rf_core::Result<&'static QualityProfile>> {
    let mut claimed = HashSet::new();
    requested
        .iter()
        .map(|id| {
            let profile = quality::resolve(id)?;
            if !claimed.insert(profile.id) {
                return Err(Error::Validation(format!(
                    "duplicate quality: {id} resolves to {} already requested",
                    profile.id
                )));
            }
            Ok(profile)
        })
        .collect()
}
