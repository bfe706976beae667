//! Message loop.
//!
//! Long-polls the work queue and hands each message to a detached task
//! bounded by a semaphore. Messages are deleted once their job reached an
//! outcome; poison messages are deleted right away; messages whose job hit
//! an unhandled error follow [`UnhandledErrorPolicy`].

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use vproc_models::JobRequest;
use vproc_queue::InFlightMessage;

use crate::config::{UnhandledErrorPolicy, WorkerConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::failure_tracker::FailureTracker;
use crate::metrics;
use crate::ports::{JobProcessor, MessageQueue};

/// Receive failures logged before suppression kicks in.
const MAX_LOGGED_RECEIVE_FAILURES: u32 = 5;

/// What happened to a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    /// Missing body or receipt token; ignored without acknowledgement.
    Dropped,
    /// Body did not decode; deleted without processing.
    Poison,
    /// Job reached an outcome (or the policy said so); deleted.
    Deleted,
    /// Deletion was attempted but failed; the message will be redelivered.
    DeleteFailed,
    /// Left on the queue after an unhandled error.
    Retained,
}

/// Consumes the work queue until shut down.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<dyn MessageQueue>,
    processor: Arc<dyn JobProcessor>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn MessageQueue>,
        processor: Arc<dyn JobProcessor>,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            queue,
            processor,
            job_semaphore,
            shutdown,
        }
    }

    /// Run the loop until [`shutdown`](Self::shutdown) is called, then wait
    /// up to the configured timeout for in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor with {} max concurrent jobs",
            self.config.max_concurrent_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut receive_failures = FailureTracker::new(MAX_LOGGED_RECEIVE_FAILURES);

        loop {
            let result = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown_rx) => break,
                result = self.poll_once() => result,
            };

            match result {
                Ok(_) => receive_failures.record_success(),
                Err(e) => {
                    metrics::record_receive_error();
                    if receive_failures.record_failure() {
                        error!(
                            "Failed to receive messages, retrying in {:?}: {}",
                            self.config.receive_backoff, e
                        );
                    }
                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown_rx) => break,
                        _ = tokio::time::sleep(self.config.receive_backoff) => {}
                    }
                }
            }
        }

        info!("Shutdown signal received, waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "{} jobs still running after {:?}, stopping anyway",
                self.in_flight(),
                self.config.shutdown_timeout
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Receive one batch and dispatch it. Returns the number dispatched.
    async fn poll_once(&self) -> WorkerResult<usize> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            // Every slot is busy; wake when one frees up
            let _ = self.job_semaphore.acquire().await;
            return Ok(0);
        }

        let max_count = self
            .config
            .batch_size
            .min(i32::try_from(available).unwrap_or(i32::MAX));
        let messages = self
            .queue
            .receive(max_count, self.config.wait_seconds)
            .await?;

        if messages.is_empty() {
            return Ok(0);
        }

        let count = messages.len();
        debug!("Received {} messages", count);
        metrics::record_received(count);

        for message in messages {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::config_error("job semaphore closed"))?;

            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            let policy = self.config.unhandled_error_policy;
            let semaphore = Arc::clone(&self.job_semaphore);
            let max_jobs = self.config.max_concurrent_jobs;

            tokio::spawn(async move {
                handle_message(queue.as_ref(), processor.as_ref(), policy, message).await;
                drop(permit);
                metrics::set_in_flight(max_jobs - semaphore.available_permits());
            });
        }
        metrics::set_in_flight(self.in_flight());

        Ok(count)
    }

    async fn wait_for_jobs(&self) {
        // Succeeds only once every permit is back
        let _ = self
            .job_semaphore
            .acquire_many(u32::try_from(self.config.max_concurrent_jobs).unwrap_or(u32::MAX))
            .await;
    }

    fn in_flight(&self) -> usize {
        self.config.max_concurrent_jobs - self.job_semaphore.available_permits()
    }

    /// Stop receiving. Jobs already dispatched keep running.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Decode, process and acknowledge a single message.
pub async fn handle_message(
    queue: &dyn MessageQueue,
    processor: &dyn JobProcessor,
    policy: UnhandledErrorPolicy,
    message: InFlightMessage,
) -> MessageDisposition {
    let Some((body, receipt_token)) = message.parts() else {
        warn!(
            message_id = ?message.message_id,
            "Message without body or receipt token, ignoring"
        );
        metrics::record_dropped();
        return MessageDisposition::Dropped;
    };

    let request = match JobRequest::decode(body) {
        Ok(request) => request,
        Err(e) => {
            warn!(
                message_id = ?message.message_id,
                "Undecodable message, deleting: {}", e
            );
            metrics::record_poison();
            delete_message(queue, receipt_token).await;
            return MessageDisposition::Poison;
        }
    };

    let job_id = request.job_id;
    match processor
        .process_job(&job_id, &request.input_reference)
        .await
    {
        Ok(outcome) => {
            info!(job_id = %job_id, outcome = outcome.as_str(), "Job finished");
            delete_message(queue, receipt_token).await
        }
        Err(e) => {
            error!(job_id = %job_id, "Job failed with unhandled error: {}", e);
            match policy {
                UnhandledErrorPolicy::Delete => delete_message(queue, receipt_token).await,
                UnhandledErrorPolicy::Retain => {
                    info!(job_id = %job_id, "Leaving message for redelivery");
                    MessageDisposition::Retained
                }
            }
        }
    }
}

async fn delete_message(queue: &dyn MessageQueue, receipt_token: &str) -> MessageDisposition {
    match queue.delete(receipt_token).await {
        Ok(()) => {
            metrics::record_deleted();
            MessageDisposition::Deleted
        }
        Err(e) => {
            error!("Failed to delete message: {}", e);
            MessageDisposition::DeleteFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::JobOutcome;
    use crate::ports::{MockJobProcessor, MockMessageQueue};
    use vproc_queue::QueueError;
    use vproc_storage::StorageError;

    fn message(body: &str) -> InFlightMessage {
        InFlightMessage::new(body.as_bytes().to_vec(), "receipt-1")
    }

    #[tokio::test]
    async fn test_missing_receipt_is_dropped() {
        let mut queue = MockMessageQueue::new();
        queue.expect_delete().never();
        let mut processor = MockJobProcessor::new();
        processor.expect_process_job().never();

        let msg = InFlightMessage {
            message_id: Some("m-1".to_string()),
            body: Some(b"{}".to_vec()),
            receipt_token: None,
        };
        let disposition =
            handle_message(&queue, &processor, UnhandledErrorPolicy::Retain, msg).await;
        assert_eq!(disposition, MessageDisposition::Dropped);
    }

    #[tokio::test]
    async fn test_poison_message_is_deleted_unprocessed() {
        let mut queue = MockMessageQueue::new();
        queue
            .expect_delete()
            .withf(|token| token == "receipt-1")
            .times(1)
            .returning(|_| Ok(()));
        let mut processor = MockJobProcessor::new();
        processor.expect_process_job().never();

        let disposition = handle_message(
            &queue,
            &processor,
            UnhandledErrorPolicy::Retain,
            message("not json"),
        )
        .await;
        assert_eq!(disposition, MessageDisposition::Poison);
    }

    #[tokio::test]
    async fn test_outcome_deletes_message() {
        let mut queue = MockMessageQueue::new();
        queue.expect_delete().times(1).returning(|_| Ok(()));
        let mut processor = MockJobProcessor::new();
        processor
            .expect_process_job()
            .withf(|id, input| id.as_str() == "job-123" && input == "input/video.mp4")
            .times(1)
            .returning(|_, _| Ok(JobOutcome::Failed));

        let disposition = handle_message(
            &queue,
            &processor,
            UnhandledErrorPolicy::Retain,
            message(r#"{"job_id":"job-123","video_path":"input/video.mp4"}"#),
        )
        .await;
        assert_eq!(disposition, MessageDisposition::Deleted);
    }

    #[tokio::test]
    async fn test_unhandled_error_follows_policy() {
        let mut processor = MockJobProcessor::new();
        processor.expect_process_job().returning(|id, _| {
            Err(WorkerError::DownloadFailed {
                job_id: id.clone(),
                source: StorageError::not_found("input/video.mp4"),
            })
        });
        let body = r#"{"job_id":"job-1","video_path":"input/video.mp4"}"#;

        let mut retaining = MockMessageQueue::new();
        retaining.expect_delete().never();
        let disposition = handle_message(
            &retaining,
            &processor,
            UnhandledErrorPolicy::Retain,
            message(body),
        )
        .await;
        assert_eq!(disposition, MessageDisposition::Retained);

        let mut deleting = MockMessageQueue::new();
        deleting.expect_delete().times(1).returning(|_| Ok(()));
        let disposition = handle_message(
            &deleting,
            &processor,
            UnhandledErrorPolicy::Delete,
            message(body),
        )
        .await;
        assert_eq!(disposition, MessageDisposition::Deleted);
    }

    #[tokio::test]
    async fn test_delete_failure_is_reported() {
        let mut queue = MockMessageQueue::new();
        queue
            .expect_delete()
            .returning(|_| Err(QueueError::delete_failed("throttled")));
        let mut processor = MockJobProcessor::new();
        processor
            .expect_process_job()
            .returning(|_, _| Ok(JobOutcome::NotFound));

        let disposition = handle_message(
            &queue,
            &processor,
            UnhandledErrorPolicy::Retain,
            message(r#"{"job_id":"ghost","video_path":"input/a.mp4"}"#),
        )
        .await;
        assert_eq!(disposition, MessageDisposition::DeleteFailed);
    }
}
