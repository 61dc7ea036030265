//! Bounded worker pool for processing jobs.
//!
//! `submit` returns as soon as the job is recorded as `pending`; the job then
//! waits for one of `max_concurrent_jobs` permits and runs on its own task.
//! Live handles are dropped once a job is terminal; later lookups are served
//! from the [`JobStore`](crate::store::JobStore).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use rf_core::events::EventPayload;
use rf_core::{Error, JobId, SourceAsset};

use crate::job::{ProcessingJob, StatusSnapshot};
use crate::orchestrator::Orchestrator;

struct JobHandle {
    state: watch::Receiver<ProcessingJob>,
    cancel: CancellationToken,
}

pub struct JobRunner {
    orchestrator: Arc<Orchestrator>,
    permits: Arc<Semaphore>,
    jobs: Arc<DashMap<JobId, JobHandle>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl JobRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, max_concurrent_jobs: usize) -> Self {
        Self {
            orchestrator,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            jobs: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Queue a job and return its id immediately.
    pub async fn submit(
        &self,
        source: SourceAsset,
        base_name: &str,
        qualities: Vec<String>,
    ) -> JobId {
        let job = ProcessingJob::new(source, base_name, qualities);
        let job_id = job.id;
        let (tx, rx) = watch::channel(job.clone());
        let tx = Arc::new(tx);
        let cancel = self.shutdown.child_token();

        if let Err(e) = self.orchestrator.store().save(&job).await {
            tracing::warn!(job_id = %job_id, "Failed to persist queued job: {e}");
        }
        self.jobs.insert(
            job_id,
            JobHandle {
                state: rx,
                cancel: cancel.clone(),
            },
        );
        self.orchestrator
            .events()
            .broadcast(EventPayload::JobQueued { job_id });
        tracing::info!(job_id = %job_id, "Job queued");

        let orchestrator = self.orchestrator.clone();
        let permits = self.permits.clone();
        let jobs = self.jobs.clone();
        self.tracker.spawn(async move {
            let _permit = tokio::select! {
                p = permits.acquire_owned() => p.ok(),
                // Still runs below, so it terminates with cancelled entries.
                _ = cancel.cancelled() => None,
            };

            let worker = {
                let orchestrator = orchestrator.clone();
                let tx = tx.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { orchestrator.run_job(job, &tx, &cancel).await })
            };

            if let Err(e) = worker.await {
                tracing::error!(job_id = %job_id, "Worker aborted: {e}");
                let mut last = ProcessingJob::clone(&tx.borrow());
                if !last.is_terminal() {
                    let elapsed = last
                        .started_at
                        .map(|t| (chrono::Utc::now() - t).to_std().unwrap_or_default())
                        .unwrap_or_default();
                    last.fail(format!("worker aborted: {e}"), elapsed);
                    tx.send_replace(last.clone());
                    if let Err(e) = orchestrator.store().save(&last).await {
                        tracing::warn!(job_id = %job_id, "Failed to persist job snapshot: {e}");
                    }
                    orchestrator.events().broadcast(EventPayload::JobFailed {
                        job_id,
                        error: last.error.clone().unwrap_or_default(),
                    });
                }
            }

            // The terminal snapshot is in the store by now.
            jobs.remove(&job_id);
        });

        job_id
    }

    /// Current status projection: the live job if it is still tracked,
    /// otherwise the stored snapshot.
    pub async fn status(&self, id: JobId) -> Option<StatusSnapshot> {
        self.job(id).await.map(|job| job.snapshot())
    }

    /// Latest full job state.
    pub async fn job(&self, id: JobId) -> Option<ProcessingJob> {
        if let Some(live) = self.live(id) {
            return Some(live);
        }
        self.stored(id).await
    }

    /// Watch a job that has not finished yet.
    pub fn subscribe(&self, id: JobId) -> Option<watch::Receiver<ProcessingJob>> {
        self.jobs.get(&id).map(|h| h.state.clone())
    }

    /// Jobs still queued or running.
    pub fn list(&self) -> Vec<StatusSnapshot> {
        self.jobs
            .iter()
            .map(|h| h.state.borrow().snapshot())
            .collect()
    }

    /// Wait for `id` to reach a terminal state.
    pub async fn wait(&self, id: JobId) -> rf_core::Result<ProcessingJob> {
        let Some(mut rx) = self.subscribe(id) else {
            return match self.stored(id).await {
                Some(job) if job.is_terminal() => Ok(job),
                _ => Err(Error::not_found("job", id)),
            };
        };
        let job = rx
            .wait_for(|job| job.is_terminal())
            .await
            .map(|job| ProcessingJob::clone(&job))
            .map_err(|_| Error::Internal(format!("job {id} dropped before finishing")))?;
        Ok(job)
    }

    fn live(&self, id: JobId) -> Option<ProcessingJob> {
        self.jobs
            .get(&id)
            .map(|h| ProcessingJob::clone(&h.state.borrow()))
    }

    async fn stored(&self, id: JobId) -> Option<ProcessingJob> {
        match self.orchestrator.store().load(id).await {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(job_id = %id, "Failed to load job snapshot: {e}");
                None
            }
        }
    }

    /// Request cancellation. Returns `false` for unknown or finished jobs.
    pub fn cancel(&self, id: JobId) -> bool {
        match self.jobs.get(&id) {
            Some(h) if !h.state.borrow().is_terminal() => {
                tracing::info!(job_id = %id, "Cancellation requested");
                h.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel everything in flight and wait for the workers to settle.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Job runner stopped");
    }
}
