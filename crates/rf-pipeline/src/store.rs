//! Durable job snapshots.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;

use rf_core::{Error, JobId};

use crate::job::ProcessingJob;

/// Persistence collaborator for [`ProcessingJob`] snapshots.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist `job`, replacing any earlier snapshot with the same id.
    async fn save(&self, job: &ProcessingJob) -> rf_core::Result<()>;

    async fn load(&self, id: JobId) -> rf_core::Result<Option<ProcessingJob>>;

    /// All stored jobs, newest first.
    async fn list(&self) -> rf_core::Result<Vec<ProcessingJob>>;
}

/// In-memory store, for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: DashMap<JobId, ProcessingJob>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn save(&self, job: &ProcessingJob) -> rf_core::Result<()> {
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn load(&self, id: JobId) -> rf_core::Result<Option<ProcessingJob>> {
        Ok(self.jobs.get(&id).map(|j| j.value().clone()))
    }

    async fn list(&self) -> rf_core::Result<Vec<ProcessingJob>> {
        let mut jobs: Vec<ProcessingJob> = self.jobs.iter().map(|j| j.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}

/// One `{job_id}.json` file per job under a directory.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// reader never sees a half-written snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileJobStore {
    dir: PathBuf,
}

impl JsonFileJobStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> rf_core::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl JobStore for JsonFileJobStore {
    async fn save(&self, job: &ProcessingJob) -> rf_core::Result<()> {
        let json = serde_json::to_vec_pretty(job)
            .map_err(|e| Error::Internal(format!("failed to serialize job {}: {e}", job.id)))?;
        let target = self.path_for(job.id);
        let tmp = self.dir.join(format!(".{}.json.tmp", job.id));

        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn load(&self, id: JobId) -> rf_core::Result<Option<ProcessingJob>> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::Internal(format!("corrupt job file {}: {e}", path.display())))
    }

    async fn list(&self) -> rf_core::Result<Vec<ProcessingJob>> {
        let mut jobs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_snapshot = path.extension().is_some_and(|e| e == "json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_snapshot {
                continue;
            }
            match tokio::fs::read(&path).await.map(|b| serde_json::from_slice::<ProcessingJob>(&b)) {
                Ok(Ok(job)) => jobs.push(job),
                Ok(Err(e)) => tracing::warn!("Skipping unreadable job file {}: {e}", path.display()),
                Err(e) => tracing::warn!("Failed to read {}: {e}", path.display()),
            }
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}
