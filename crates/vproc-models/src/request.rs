//! Work queue message payload.

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::JobId;

/// Errors decoding a queue message body.
#[derive(Debug, Error)]
pub enum MessageDecodeError {
    #[error("Message body is not valid JSON for a job request: {0}")]
    Json(#[from] serde_json::Error),
}

/// Request to process one job, as carried in a work queue message body.
///
/// Wire format: `{"job_id": "...", "video_path": "..."}`. Unknown fields are
/// ignored. A missing or null `video_path` decodes to an empty reference,
/// which the orchestrator treats as a malformed request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobRequest {
    pub job_id: JobId,
    #[serde(rename = "video_path", default, deserialize_with = "null_as_empty")]
    pub input_reference: String,
}

impl JobRequest {
    /// Decode a raw message body.
    pub fn decode(body: &[u8]) -> Result<Self, MessageDecodeError> {
        Ok(serde_json::from_slice(body)?)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
