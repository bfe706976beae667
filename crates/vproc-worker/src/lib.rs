//! Frame extraction job worker.
//!
//! This crate provides:
//! - The message loop consuming the work queue
//! - Job orchestration (status updates, download, transform, upload)
//! - Failure handling with status updates and failure events
//! - Ports for every external capability, with production adapters

pub mod adapters;
pub mod config;
pub mod error;
pub mod executor;
pub mod failure_tracker;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod ports;

pub use config::{UnhandledErrorPolicy, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use executor::{handle_message, JobExecutor, MessageDisposition};
pub use logging::JobLogger;
pub use orchestrator::{output_reference, JobOrchestrator, JobOutcome, OUTPUT_PREFIX};
pub use ports::{
    ArtifactStore, FailureNotifier, JobProcessor, MessageQueue, StatusCache, StatusStore,
    Transform, TransformOutput,
};
