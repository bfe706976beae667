//! Failure notification payload.

use serde::{Deserialize, Serialize};

use crate::{Job, JobId};

/// Event published to the error queue when a job ends in the failed state.
///
/// Fire-and-forget: nothing in the worker persists or reads it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub job_id: JobId,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// RFC 3339 timestamp
    pub failed_at: String,
}

impl FailureEvent {
    /// Build an event for a job that just failed.
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            user_id: job.user_id.clone(),
            email: job.email.clone(),
            failed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
