//! SQS work queue with a Redis status mirror.
//!
//! This crate provides:
//! - Long-poll receive and delete against the work queue
//! - Failure event publication to the error queue
//! - Job status mirroring in Redis for fast polling

pub mod cache;
pub mod error;
pub mod message;
pub mod queue;

pub use cache::{CacheConfig, StatusCacheClient, JOB_STATUS_TTL_SECS};
pub use error::{QueueError, QueueResult};
pub use message::InFlightMessage;
pub use queue::{QueueConfig, SqsQueue};
