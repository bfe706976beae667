//! Worker error types.

use thiserror::Error;
use vproc_models::JobId;
use vproc_storage::StorageError;
use vproc_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that end a job without a terminal status being recorded.
///
/// The job-level failures (transform, upload) are not errors at this level:
/// they are turned into a `Failed` status and a failure event instead.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to fetch job {job_id}: {source}")]
    FetchFailed {
        job_id: JobId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to mark job {job_id} as processing: {source}")]
    MarkProcessingFailed {
        job_id: JobId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to download input for job {job_id}: {source}")]
    DownloadFailed {
        job_id: JobId,
        #[source]
        source: StorageError,
    },

    #[error("Job {job_id} produced {output_reference} but its completion was not recorded: {source}")]
    MarkCompletedFailed {
        job_id: JobId,
        output_reference: String,
        #[source]
        source: StoreError,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] vproc_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
