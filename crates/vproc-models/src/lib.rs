//! Shared data models for the vproc worker.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job status and the status history
//! - Work queue message payloads
//! - Failure notification events

pub mod event;
pub mod job;
pub mod request;

// Re-export common types
pub use event::FailureEvent;
pub use job::{Job, JobId, JobStatus, StatusTransition};
pub use request::{JobRequest, MessageDecodeError};
