//! Port implementations for the production clients.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use vproc_media::{FrameExtractor, MediaResult};
use vproc_models::{FailureEvent, Job, JobId, JobStatus, StatusTransition};
use vproc_queue::{InFlightMessage, QueueResult, SqsQueue, StatusCacheClient};
use vproc_storage::{S3Client, StorageResult};
use vproc_store::{JobRepository, StoreResult};

use crate::ports::{
    ArtifactStore, FailureNotifier, MessageQueue, StatusCache, StatusStore, Transform,
    TransformOutput,
};

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self, max_count: i32, wait_seconds: i32) -> QueueResult<Vec<InFlightMessage>> {
        SqsQueue::receive(self, max_count, wait_seconds).await
    }

    async fn delete(&self, receipt_token: &str) -> QueueResult<()> {
        SqsQueue::delete(self, receipt_token).await
    }
}

#[async_trait]
impl FailureNotifier for SqsQueue {
    async fn publish_failure(&self, event: &FailureEvent) -> QueueResult<()> {
        SqsQueue::publish_failure(self, event).await
    }
}

#[async_trait]
impl StatusStore for JobRepository {
    async fn fetch_job(&self, job_id: &JobId) -> StoreResult<Job> {
        JobRepository::fetch_job(self, job_id).await
    }

    async fn persist_status(&self, job: &Job, transition: &StatusTransition) -> StoreResult<()> {
        JobRepository::persist_status(self, job, transition).await
    }
}

#[async_trait]
impl StatusCache for StatusCacheClient {
    async fn set_job_status(&self, job_id: &JobId, status: JobStatus) -> QueueResult<()> {
        StatusCacheClient::set_job_status(self, job_id, status).await
    }
}

#[async_trait]
impl ArtifactStore for S3Client {
    async fn download(&self, reference: &str, dest_dir: &Path) -> StorageResult<PathBuf> {
        self.download_to_dir(reference, dest_dir).await
    }

    async fn upload(&self, local_path: &Path, reference: &str) -> StorageResult<()> {
        self.upload_file(local_path, reference).await
    }
}

#[async_trait]
impl Transform for FrameExtractor {
    async fn transform(&self, input: &Path, work_dir: &Path) -> MediaResult<TransformOutput> {
        let archive = self.extract(input, work_dir).await?;
        Ok(TransformOutput {
            path: archive.path,
            name: archive.name,
        })
    }
}
