//! Job record and status history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
///
/// Ids are assigned upstream when the job is created; the worker only ever
/// receives them from queue messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job processing status.
///
/// There is no pending state: jobs are created upstream and the worker
/// only moves them forward from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is actively being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed and will not be retried automatically
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the stored string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job record as owned by the status store.
///
/// The worker holds a copy of this only for the duration of one
/// processing run. `output_reference` is set if and only if the status is
/// [`JobStatus::Completed`]; the `mark_*` methods keep that true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Current status
    pub status: JobStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Object key of the uploaded input video
    pub input_reference: String,
    /// Object key of the produced archive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_reference: Option<String>,
    /// Owning user
    pub user_id: String,
    /// Owner email, used for failure notification routing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Job {
    /// Move the job to processing and return the history record to persist.
    pub fn mark_processing(&mut self) -> StatusTransition {
        self.output_reference = None;
        self.apply(JobStatus::Processing)
    }

    /// Move the job to completed with its output reference.
    pub fn mark_completed(&mut self, output_reference: impl Into<String>) -> StatusTransition {
        self.output_reference = Some(output_reference.into());
        self.apply(JobStatus::Completed)
    }

    /// Move the job to failed.
    pub fn mark_failed(&mut self) -> StatusTransition {
        self.output_reference = None;
        self.apply(JobStatus::Failed)
    }

    fn apply(&mut self, status: JobStatus) -> StatusTransition {
        self.status = status;
        StatusTransition::new(self.id.clone(), status)
    }
}

/// Append-only record of a single status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub id: Uuid,
    pub job_id: JobId,
    pub status: JobStatus,
    pub recorded_at: DateTime<Utc>,
}

impl StatusTransition {
    pub fn new(job_id: JobId, status: JobStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            status,
            recorded_at: Utc::now(),
        }
    }
}
