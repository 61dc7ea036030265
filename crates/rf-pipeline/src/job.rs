//! The `ProcessingJob` aggregate and its read-only projections.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rf_core::{
    elapsed_ms, JobId, MediaInfo, QualityId, RenditionResult, SourceAsset, ThumbnailResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time spent in each pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTimings {
    pub analysis_ms: u64,
    pub thumbnail_ms: u64,
    pub renditions_ms: u64,
}

/// One upload's pipeline run.
///
/// Only the orchestrator running the job mutates it; everyone else works on
/// cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: JobId,
    pub source: SourceAsset,
    /// Caller-chosen stem for every output file of this job.
    pub base_name: String,
    /// Quality identifiers in request order, verbatim.
    pub requested: Vec<String>,
    pub status: JobStatus,
    pub media: Option<MediaInfo>,
    pub thumbnail: Option<ThumbnailResult>,
    /// Append-only, in request order.
    pub renditions: Vec<RenditionResult>,
    pub timings: StepTimings,
    pub total_processing_time_ms: Option<u64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    pub fn new(source: SourceAsset, base_name: impl Into<String>, requested: Vec<String>) -> Self {
        Self {
            id: JobId::new(),
            source,
            base_name: base_name.into(),
            requested,
            status: JobStatus::Pending,
            media: None,
            thumbnail: None,
            renditions: Vec::new(),
            timings: StepTimings::default(),
            total_processing_time_ms: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    pub fn record_media(&mut self, media: MediaInfo, elapsed: Duration) {
        self.media = Some(media);
        self.timings.analysis_ms = elapsed_ms(elapsed);
    }

    pub fn record_thumbnail(&mut self, thumbnail: ThumbnailResult) {
        self.timings.thumbnail_ms = thumbnail.processing_time_ms;
        self.thumbnail = Some(thumbnail);
    }

    pub fn push_rendition(&mut self, result: RenditionResult) {
        self.renditions.push(result);
    }

    /// Terminal transition after every quality was attempted.
    pub fn finish(&mut self, total: Duration) {
        let ready = self.ready_count();
        if ready > 0 {
            self.status = JobStatus::Completed;
        } else {
            self.status = JobStatus::Failed;
            self.error = Some(format!(
                "no renditions succeeded (0/{})",
                self.requested.len()
            ));
        }
        self.close(total);
    }

    /// Terminal transition on an unrecoverable error.
    pub fn fail(&mut self, error: impl Into<String>, total: Duration) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.close(total);
    }

    fn close(&mut self, total: Duration) {
        self.total_processing_time_ms = Some(elapsed_ms(total));
        self.completed_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ready_count(&self) -> usize {
        self.renditions.iter().filter(|r| r.is_ready()).count()
    }

    /// Identifiers whose rendition succeeded, in request order.
    pub fn completed_qualities(&self) -> Vec<String> {
        self.renditions
            .iter()
            .filter(|r| r.is_ready())
            .map(|r| r.quality.clone())
            .collect()
    }

    /// External-facing projection, valid at any point of the run.
    pub fn snapshot(&self) -> StatusSnapshot {
        let completed_qualities = self.completed_qualities();
        let total_requested = self.requested.len();
        let progress_percent = if total_requested == 0 {
            0
        } else {
            ((completed_qualities.len() as f64 / total_requested as f64) * 100.0).round() as u32
        };

        StatusSnapshot {
            job_id: self.id,
            base_name: self.base_name.clone(),
            status: self.status,
            completed_qualities,
            total_requested,
            progress_percent,
            total_processing_time_ms: self.total_processing_time_ms,
            error_detail: self.error.clone(),
        }
    }

    /// Pick what to serve: the requested quality if ready, else the best
    /// ready rendition, else the original upload.
    pub fn select_playback(&self, requested: Option<QualityId>) -> PlaybackSelection {
        let ready: Vec<(QualityId, &RenditionResult)> = self
            .renditions
            .iter()
            .filter(|r| r.is_ready())
            .filter_map(|r| QualityId::from_str(&r.quality).ok().map(|q| (q, r)))
            .collect();

        let pick = requested
            .and_then(|want| ready.iter().find(|(q, _)| *q == want))
            .or_else(|| {
                let best = QualityId::best_of(ready.iter().map(|(q, _)| *q))?;
                ready.iter().find(|(q, _)| *q == best)
            });

        match pick.and_then(|(q, r)| r.output_path.clone().map(|p| (*q, p))) {
            Some((quality, path)) => PlaybackSelection::Rendition { quality, path },
            None => PlaybackSelection::Original(self.source.path.clone()),
        }
    }
}

/// What a status poll returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub job_id: JobId,
    pub base_name: String,
    pub status: JobStatus,
    pub completed_qualities: Vec<String>,
    pub total_requested: usize,
    pub progress_percent: u32,
    pub total_processing_time_ms: Option<u64>,
    pub error_detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackSelection {
    Rendition { quality: QualityId, path: PathBuf },
    Original(PathBuf),
}

impl PlaybackSelection {
    pub fn path(&self) -> &std::path::Path {
        match self {
            PlaybackSelection::Rendition { path, .. } | PlaybackSelection::Original(path) => path,
        }
    }
}
