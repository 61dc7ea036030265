//! # rf-pipeline
//!
//! Job orchestration for the reelforge ingestion pipeline.
//!
//! - **[`ProcessingJob`]** -- the aggregate for one upload's run, with its
//!   [`StatusSnapshot`] projection and playback selection.
//! - **[`Orchestrator`]** -- runs inspect, thumbnail and per-quality encodes
//!   with failure isolation and incremental publication.
//! - **[`JobStore`]** -- persistence collaborator (in-memory or JSON files).
//! - **[`UploadIntake`]** -- validates and imports uploads.
//! - **[`JobRunner`]** -- bounded worker pool with status polling and
//!   cancellation.

pub mod intake;
pub mod job;
pub mod orchestrator;
pub mod runner;
pub mod store;

pub use intake::{base_name_for, find_first_video, stored_file_name, UploadIntake, UploadRequest};
pub use job::{JobStatus, PlaybackSelection, ProcessingJob, StatusSnapshot, StepTimings};
pub use orchestrator::{Orchestrator, OrchestratorSettings, CANCELLED_DETAIL};
pub use runner::JobRunner;
pub use store::{JobStore, JsonFileJobStore, MemoryJobStore};
