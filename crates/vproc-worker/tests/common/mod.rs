//! In-memory implementations of the worker ports.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use vproc_media::{MediaError, MediaResult};
use vproc_models::{FailureEvent, Job, JobId, JobStatus, StatusTransition};
use vproc_queue::{InFlightMessage, QueueError, QueueResult};
use vproc_storage::{StorageError, StorageResult};
use vproc_store::{StoreError, StoreResult};
use vproc_worker::{
    ArtifactStore, FailureNotifier, JobOrchestrator, JobOutcome, JobProcessor, MessageQueue,
    StatusCache, StatusStore, Transform, TransformOutput, WorkerResult,
};

pub fn job(id: &str, input: &str) -> Job {
    Job {
        id: JobId::from(id),
        status: JobStatus::Processing,
        created_at: Utc::now(),
        input_reference: input.to_string(),
        output_reference: None,
        user_id: "user-42".to_string(),
        email: Some("owner@example.com".to_string()),
    }
}

pub fn body(job_id: &str, input: &str) -> String {
    format!(r#"{{"job_id":"{}","video_path":"{}"}}"#, job_id, input)
}

/// Job table plus history, with optional injected write failures.
#[derive(Default)]
pub struct MemoryStore {
    pub jobs: Mutex<HashMap<JobId, Job>>,
    pub history: Mutex<Vec<StatusTransition>>,
    /// Statuses whose persistence fails
    pub fail_on: Mutex<Vec<JobStatus>>,
    pub fail_fetch: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        let store = Self::default();
        {
            let mut map = store.jobs.lock().unwrap();
            for job in jobs {
                map.insert(job.id.clone(), job);
            }
        }
        store
    }

    pub fn job(&self, id: &str) -> Job {
        self.jobs.lock().unwrap()[&JobId::from(id)].clone()
    }

    pub fn history_for(&self, id: &str) -> Vec<JobStatus> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.job_id.as_str() == id)
            .map(|t| t.status)
            .collect()
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn fetch_job(&self, job_id: &JobId) -> StoreResult<Job> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(StoreError::invalid_record("connection reset"));
        }
        self.jobs
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(job_id.as_str()))
    }

    async fn persist_status(&self, job: &Job, transition: &StatusTransition) -> StoreResult<()> {
        if self.fail_on.lock().unwrap().contains(&transition.status) {
            return Err(StoreError::invalid_record("write rejected"));
        }
        let mut jobs = self.jobs.lock().unwrap();
        let stored = jobs
            .get_mut(&job.id)
            .ok_or_else(|| StoreError::not_found(job.id.as_str()))?;
        stored.status = job.status;
        stored.output_reference = job.output_reference.clone();
        self.history.lock().unwrap().push(transition.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    pub entries: Mutex<HashMap<JobId, JobStatus>>,
    pub unavailable: Mutex<bool>,
}

#[async_trait]
impl StatusCache for MemoryCache {
    async fn set_job_status(&self, job_id: &JobId, status: JobStatus) -> QueueResult<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(QueueError::config_error("cache unavailable"));
        }
        self.entries.lock().unwrap().insert(job_id.clone(), status);
        Ok(())
    }
}

/// Object store keyed by reference.
#[derive(Default)]
pub struct MemoryArtifacts {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_uploads: Mutex<bool>,
    /// Directories downloads were written into
    pub download_dirs: Mutex<Vec<PathBuf>>,
}

impl MemoryArtifacts {
    pub fn with_object(reference: &str, data: &[u8]) -> Self {
        let artifacts = Self::default();
        artifacts
            .objects
            .lock()
            .unwrap()
            .insert(reference.to_string(), data.to_vec());
        artifacts
    }

    pub fn object(&self, reference: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(reference).cloned()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn download(&self, reference: &str, dest_dir: &Path) -> StorageResult<PathBuf> {
        let data = self
            .object(reference)
            .ok_or_else(|| StorageError::not_found(reference))?;
        self.download_dirs.lock().unwrap().push(dest_dir.to_path_buf());

        let path = dest_dir.join("input.mp4");
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    async fn upload(&self, local_path: &Path, reference: &str) -> StorageResult<()> {
        if *self.fail_uploads.lock().unwrap() {
            return Err(StorageError::upload_failed("bucket unavailable"));
        }
        let data = tokio::fs::read(local_path).await?;
        self.objects
            .lock()
            .unwrap()
            .insert(reference.to_string(), data);
        Ok(())
    }
}

/// Writes the input bytes back out as `name`.
pub struct CopyTransform {
    pub name: String,
    pub fail: bool,
}

impl CopyTransform {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            name: "unused.zip".to_string(),
            fail: true,
        }
    }
}

#[async_trait]
impl Transform for CopyTransform {
    async fn transform(&self, input: &Path, work_dir: &Path) -> MediaResult<TransformOutput> {
        if self.fail {
            return Err(MediaError::NoFrames(work_dir.to_path_buf()));
        }
        let path = work_dir.join(&self.name);
        tokio::fs::copy(input, &path).await?;
        Ok(TransformOutput {
            path,
            name: self.name.clone(),
        })
    }
}

#[derive(Default)]
pub struct MemoryNotifier {
    pub events: Mutex<Vec<FailureEvent>>,
    pub unavailable: Mutex<bool>,
}

#[async_trait]
impl FailureNotifier for MemoryNotifier {
    async fn publish_failure(&self, event: &FailureEvent) -> QueueResult<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(QueueError::publish_failed("error queue unavailable"));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Queue that hands out scripted batches, then nothing.
#[derive(Default)]
pub struct ScriptedQueue {
    pub batches: Mutex<VecDeque<QueueResult<Vec<InFlightMessage>>>>,
    pub deleted: Mutex<Vec<String>>,
    pub receive_calls: AtomicUsize,
}

impl ScriptedQueue {
    pub fn push_batch(&self, messages: Vec<InFlightMessage>) {
        self.batches.lock().unwrap().push_back(Ok(messages));
    }

    pub fn push_error(&self) {
        self.batches
            .lock()
            .unwrap()
            .push_back(Err(QueueError::receive_failed("connection refused")));
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageQueue for ScriptedQueue {
    async fn receive(&self, max_count: i32, _wait_seconds: i32) -> QueueResult<Vec<InFlightMessage>> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(Ok(mut messages)) => {
                let limit = max_count.max(0) as usize;
                if messages.len() > limit {
                    // Undelivered messages stay queued
                    let rest = messages.split_off(limit);
                    self.batches.lock().unwrap().push_front(Ok(rest));
                }
                Ok(messages)
            }
            Some(Err(e)) => Err(e),
            None => {
                // Behave like an idle long poll
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn delete(&self, receipt_token: &str) -> QueueResult<()> {
        self.deleted.lock().unwrap().push(receipt_token.to_string());
        Ok(())
    }
}

/// Processor that sleeps and records peak concurrency.
#[derive(Default)]
pub struct SlowProcessor {
    pub delay: Duration,
    pub running: AtomicUsize,
    pub peak: AtomicUsize,
    pub processed: Mutex<Vec<JobId>>,
}

impl SlowProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn processed(&self) -> Vec<JobId> {
        self.processed.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobProcessor for SlowProcessor {
    async fn process_job(&self, job_id: &JobId, _input_reference: &str) -> WorkerResult<JobOutcome> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.processed.lock().unwrap().push(job_id.clone());
        Ok(JobOutcome::Completed {
            output_reference: format!("output/{}.zip", job_id),
        })
    }
}

/// All fakes behind one orchestrator.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub artifacts: Arc<MemoryArtifacts>,
    pub notifier: Arc<MemoryNotifier>,
    pub work_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(store: MemoryStore, artifacts: MemoryArtifacts) -> Self {
        Self {
            store: Arc::new(store),
            cache: Arc::new(MemoryCache::default()),
            artifacts: Arc::new(artifacts),
            notifier: Arc::new(MemoryNotifier::default()),
            work_dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn orchestrator(&self, transform: impl Transform + 'static) -> JobOrchestrator {
        JobOrchestrator::new(
            self.store.clone(),
            self.cache.clone(),
            self.artifacts.clone(),
            Arc::new(transform),
            self.notifier.clone(),
            self.work_dir.path(),
        )
    }

    /// Entries left in the work directory.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.work_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
