//! Work and error queues on SQS.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::Client;
use tracing::{debug, info};

use vproc_models::FailureEvent;

use crate::error::{QueueError, QueueResult};
use crate::message::InFlightMessage;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// URL of the queue carrying job requests
    pub work_queue_url: String,
    /// URL of the queue receiving failure events
    pub error_queue_url: String,
    /// AWS region (falls back to the SDK default chain)
    pub region: Option<String>,
    /// Custom endpoint, e.g. LocalStack
    pub endpoint_url: Option<String>,
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Ok(Self {
            work_queue_url: std::env::var("SQS_WORK_QUEUE_URL")
                .map_err(|_| QueueError::config_error("SQS_WORK_QUEUE_URL not set"))?,
            error_queue_url: std::env::var("SQS_ERROR_QUEUE_URL")
                .map_err(|_| QueueError::config_error("SQS_ERROR_QUEUE_URL not set"))?,
            region: std::env::var("AWS_REGION").ok(),
            endpoint_url: std::env::var("AWS_ENDPOINT_URL").ok(),
        })
    }
}

/// SQS client bound to the work queue and the error queue.
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    config: QueueConfig,
}

impl SqsQueue {
    /// Create a new queue client.
    pub async fn new(config: QueueConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self {
            client: Client::new(&sdk_config),
            config,
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> QueueResult<Self> {
        Ok(Self::new(QueueConfig::from_env()?).await)
    }

    /// Long-poll the work queue for up to `max_count` messages.
    ///
    /// An empty vector means the wait elapsed with nothing to deliver.
    pub async fn receive(
        &self,
        max_count: i32,
        wait_seconds: i32,
    ) -> QueueResult<Vec<InFlightMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.config.work_queue_url)
            .max_number_of_messages(max_count)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|e| QueueError::receive_failed(e.to_string()))?;

        let messages: Vec<InFlightMessage> = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| InFlightMessage {
                message_id: m.message_id,
                body: m.body.map(String::into_bytes),
                receipt_token: m.receipt_handle,
            })
            .collect();

        debug!("Received {} messages from work queue", messages.len());
        Ok(messages)
    }

    /// Delete a message from the work queue.
    pub async fn delete(&self, receipt_token: &str) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.work_queue_url)
            .receipt_handle(receipt_token)
            .send()
            .await
            .map_err(|e| QueueError::delete_failed(e.to_string()))?;

        debug!("Deleted message from work queue");
        Ok(())
    }

    /// Publish a failure event to the error queue.
    pub async fn publish_failure(&self, event: &FailureEvent) -> QueueResult<()> {
        let body = serde_json::to_string(event)?;

        self.client
            .send_message()
            .queue_url(&self.config.error_queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| QueueError::publish_failed(e.to_string()))?;

        info!("Published failure event for job {}", event.job_id);
        Ok(())
    }
}
