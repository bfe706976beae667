//! Job orchestration.
//!
//! One job runs through a fixed sequence:
//!
//! 1. fetch the job record
//! 2. mark it `processing`
//! 3. download the input into a per-job scratch directory
//! 4. run the transform
//! 5. upload the artifact under `output/<name>`
//! 6. mark it `completed` with the output reference
//!
//! Transform and upload failures are handled here: the job is marked
//! `failed` and a failure event is published. Failures before the
//! transform, and a failed final status write, are returned to the caller
//! as [`WorkerError`]s and leave the job in whatever state it reached.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::Instrument;
use vproc_models::{FailureEvent, Job, JobId, StatusTransition};
use vproc_store::StoreResult;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::ports::{
    ArtifactStore, FailureNotifier, JobProcessor, StatusCache, StatusStore, Transform,
    TransformOutput,
};

/// Prefix under which artifacts are uploaded.
pub const OUTPUT_PREFIX: &str = "output";

/// Scratch subdirectories for downloads and transform output.
const INPUT_DIR: &str = "input";
const OUTPUT_DIR: &str = "output";

/// How a job ended when no unhandled error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The request had no input reference; nothing was touched.
    Discarded,
    /// The store has no such job; nothing was touched.
    NotFound,
    /// The artifact was uploaded and the job marked completed.
    Completed { output_reference: String },
    /// The job was marked failed and a failure event published.
    Failed,
}

impl JobOutcome {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discarded => "discarded",
            Self::NotFound => "not_found",
            Self::Completed { .. } => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Output reference for a transform artifact.
pub fn output_reference(output: &TransformOutput) -> String {
    let base = Path::new(&output.name)
        .file_name()
        .or_else(|| output.path.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    format!("{}/{}", OUTPUT_PREFIX, base)
}

/// Drives a single job through its lifecycle.
pub struct JobOrchestrator {
    store: Arc<dyn StatusStore>,
    cache: Arc<dyn StatusCache>,
    artifacts: Arc<dyn ArtifactStore>,
    transform: Arc<dyn Transform>,
    notifier: Arc<dyn FailureNotifier>,
    work_dir: PathBuf,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn StatusStore>,
        cache: Arc<dyn StatusCache>,
        artifacts: Arc<dyn ArtifactStore>,
        transform: Arc<dyn Transform>,
        notifier: Arc<dyn FailureNotifier>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            cache,
            artifacts,
            transform,
            notifier,
            work_dir: work_dir.into(),
        }
    }

    /// Run one job to completion.
    pub async fn process_job(
        &self,
        job_id: &JobId,
        input_reference: &str,
    ) -> WorkerResult<JobOutcome> {
        let logger = JobLogger::new(job_id, "frame_extraction");
        let started = Instant::now();

        let result = self
            .run(job_id, input_reference, &logger)
            .instrument(logger.span())
            .await;

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(outcome) => metrics::record_job(outcome.as_str(), elapsed),
            Err(_) => metrics::record_job("error", elapsed),
        }
        result
    }

    async fn run(
        &self,
        job_id: &JobId,
        input_reference: &str,
        logger: &JobLogger,
    ) -> WorkerResult<JobOutcome> {
        if input_reference.trim().is_empty() {
            logger.log_error("request has no input reference, discarding");
            return Ok(JobOutcome::Discarded);
        }
        logger.log_start(&format!("input {}", input_reference));

        let mut job = match self.store.fetch_job(job_id).await {
            Ok(job) => job,
            Err(e) if e.is_not_found() => {
                logger.log_warning("job does not exist, discarding");
                return Ok(JobOutcome::NotFound);
            }
            Err(source) => {
                return Err(WorkerError::FetchFailed {
                    job_id: job_id.clone(),
                    source,
                })
            }
        };

        let transition = job.mark_processing();
        self.set_status(&job, &transition)
            .await
            .map_err(|source| WorkerError::MarkProcessingFailed {
                job_id: job_id.clone(),
                source,
            })?;

        // Removed when dropped, on every exit path below
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.work_dir)?;
        // Inputs are named after their key, so keep them apart from
        // whatever the transform writes
        let input_dir = scratch.path().join(INPUT_DIR);
        let output_dir = scratch.path().join(OUTPUT_DIR);
        tokio::fs::create_dir_all(&input_dir).await?;
        tokio::fs::create_dir_all(&output_dir).await?;

        let input = self
            .artifacts
            .download(input_reference, &input_dir)
            .await
            .map_err(|source| WorkerError::DownloadFailed {
                job_id: job_id.clone(),
                source,
            })?;
        logger.log_progress(&format!("downloaded to {}", input.display()));

        let output = match self.transform.transform(&input, &output_dir).await {
            Ok(output) => output,
            Err(e) => {
                logger.log_error(&format!("transform failed: {}", e));
                self.fail(&mut job, logger).await;
                return Ok(JobOutcome::Failed);
            }
        };

        let output_reference = output_reference(&output);
        if let Err(e) = self.artifacts.upload(&output.path, &output_reference).await {
            logger.log_error(&format!("upload of {} failed: {}", output_reference, e));
            self.fail(&mut job, logger).await;
            return Ok(JobOutcome::Failed);
        }

        let transition = job.mark_completed(&output_reference);
        self.set_status(&job, &transition)
            .await
            .map_err(|source| WorkerError::MarkCompletedFailed {
                job_id: job_id.clone(),
                output_reference: output_reference.clone(),
                source,
            })?;

        logger.log_completion(&output_reference);
        Ok(JobOutcome::Completed { output_reference })
    }

    /// Write the status to the store, then mirror it to the cache.
    ///
    /// Only the store write can fail the call.
    async fn set_status(&self, job: &Job, transition: &StatusTransition) -> StoreResult<()> {
        self.store.persist_status(job, transition).await?;

        if let Err(e) = self.cache.set_job_status(&job.id, job.status).await {
            tracing::warn!(
                job_id = %job.id,
                status = %job.status,
                "Failed to mirror job status to cache: {}", e
            );
        }
        Ok(())
    }

    /// Mark the job failed and announce it. Errors here are logged only.
    async fn fail(&self, job: &mut Job, logger: &JobLogger) {
        let transition = job.mark_failed();
        if let Err(e) = self.set_status(job, &transition).await {
            logger.log_error(&format!("failed to record failed status: {}", e));
        }

        let event = FailureEvent::for_job(job);
        if let Err(e) = self.notifier.publish_failure(&event).await {
            logger.log_error(&format!("failed to publish failure event: {}", e));
        }
    }
}

#[async_trait]
impl JobProcessor for JobOrchestrator {
    async fn process_job(&self, job_id: &JobId, input_reference: &str) -> WorkerResult<JobOutcome> {
        JobOrchestrator::process_job(self, job_id, input_reference).await
    }
}
