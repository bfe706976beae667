//! Capabilities the worker depends on.
//!
//! The orchestrator and the message loop only see these traits; the
//! concrete SQS, S3, Postgres, Redis and FFmpeg clients are wired in by
//! [`crate::adapters`], and tests substitute in-memory fakes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use vproc_media::MediaResult;
use vproc_models::{FailureEvent, Job, JobId, JobStatus, StatusTransition};
use vproc_queue::{InFlightMessage, QueueResult};
use vproc_storage::StorageResult;
use vproc_store::StoreResult;

use crate::error::WorkerResult;
use crate::orchestrator::JobOutcome;

/// Work queue with at-least-once delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-poll for up to `max_count` messages, waiting at most
    /// `wait_seconds`. An empty batch is not an error.
    async fn receive(&self, max_count: i32, wait_seconds: i32) -> QueueResult<Vec<InFlightMessage>>;

    /// Acknowledge a message so it is not redelivered.
    async fn delete(&self, receipt_token: &str) -> QueueResult<()>;
}

/// Publishes job failure events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    async fn publish_failure(&self, event: &FailureEvent) -> QueueResult<()>;
}

/// Authoritative job status store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Load a job; unknown ids yield a not-found error.
    async fn fetch_job(&self, job_id: &JobId) -> StoreResult<Job>;

    /// Persist the job's status and output reference together with the
    /// history entry, atomically.
    async fn persist_status(&self, job: &Job, transition: &StatusTransition) -> StoreResult<()>;
}

/// Best-effort status mirror for fast polling.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusCache: Send + Sync {
    async fn set_job_status(&self, job_id: &JobId, status: JobStatus) -> QueueResult<()>;
}

/// Object store holding inputs and outputs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Download `reference` into `dest_dir`, returning the local path.
    async fn download(&self, reference: &str, dest_dir: &Path) -> StorageResult<PathBuf>;

    /// Upload a local file under `reference`.
    async fn upload(&self, local_path: &Path, reference: &str) -> StorageResult<()>;
}

/// Output of a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// Local path of the produced artifact
    pub path: PathBuf,
    /// Artifact name used to build the output reference
    pub name: String,
}

/// Turns a local input into a single output artifact inside `work_dir`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, input: &Path, work_dir: &Path) -> MediaResult<TransformOutput>;
}

/// Runs one job to an outcome. Implemented by the orchestrator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process_job(&self, job_id: &JobId, input_reference: &str) -> WorkerResult<JobOutcome>;
}
