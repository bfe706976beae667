//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// SQS caps a single receive at 10 messages.
pub const MAX_BATCH_SIZE: i32 = 10;
/// SQS caps long-poll waits at 20 seconds.
pub const MAX_WAIT_SECONDS: i32 = 20;
/// Upper bound on concurrent jobs; each one holds a scratch directory and
/// an FFmpeg process.
pub const MAX_CONCURRENT_JOBS: usize = 1024;

/// What to do with a message whose job ended in an unhandled error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhandledErrorPolicy {
    /// Leave the message on the queue; it is redelivered after its
    /// visibility timeout and the job is processed again.
    #[default]
    Retain,
    /// Delete the message; the job stays in whatever state it reached.
    Delete,
}

impl FromStr for UnhandledErrorPolicy {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retain" => Ok(Self::Retain),
            "delete" => Ok(Self::Delete),
            other => Err(WorkerError::config_error(format!(
                "unknown unhandled error policy '{}' (expected 'retain' or 'delete')",
                other
            ))),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Messages requested per receive
    pub batch_size: i32,
    /// Long-poll wait per receive, in seconds
    pub wait_seconds: i32,
    /// Fixed pause after a failed receive
    pub receive_backoff: Duration,
    /// How long to wait for in-flight jobs after shutdown
    pub shutdown_timeout: Duration,
    /// Parent directory for per-job scratch directories
    pub work_dir: PathBuf,
    /// Deletion policy for unhandled job errors
    pub unhandled_error_policy: UnhandledErrorPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 10,
            batch_size: MAX_BATCH_SIZE,
            wait_seconds: MAX_WAIT_SECONDS,
            receive_backoff: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(60),
            work_dir: std::env::temp_dir().join("vproc"),
            unhandled_error_policy: UnhandledErrorPolicy::Retain,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let config = Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS").unwrap_or(defaults.max_concurrent_jobs),
            batch_size: env_parse("WORKER_BATCH_SIZE").unwrap_or(defaults.batch_size),
            wait_seconds: env_parse("WORKER_WAIT_SECONDS").unwrap_or(defaults.wait_seconds),
            receive_backoff: env_parse("WORKER_RECEIVE_BACKOFF_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.receive_backoff),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            unhandled_error_policy: match std::env::var("WORKER_UNHANDLED_ERROR_POLICY") {
                Ok(s) => s.parse()?,
                Err(_) => defaults.unhandled_error_policy,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the limits the queue and the pool impose.
    pub fn validate(&self) -> WorkerResult<()> {
        if !(1..=MAX_CONCURRENT_JOBS).contains(&self.max_concurrent_jobs) {
            return Err(WorkerError::config_error(format!(
                "WORKER_MAX_JOBS must be between 1 and {}",
                MAX_CONCURRENT_JOBS
            )));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(WorkerError::config_error(format!(
                "WORKER_BATCH_SIZE must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }
        if !(0..=MAX_WAIT_SECONDS).contains(&self.wait_seconds) {
            return Err(WorkerError::config_error(format!(
                "WORKER_WAIT_SECONDS must be between 0 and {}",
                MAX_WAIT_SECONDS
            )));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
