//! Job status mirror in Redis.
//!
//! The relational store stays the source of truth; this cache only serves
//! fast status polling and may lag behind it.

use redis::AsyncCommands;
use tracing::debug;

use vproc_models::{JobId, JobStatus};

use crate::error::QueueResult;

/// TTL for cached job status entries (24 hours).
pub const JOB_STATUS_TTL_SECS: u64 = 24 * 60 * 60;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis URL
    pub redis_url: String,
    /// Entry TTL in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            ttl_secs: JOB_STATUS_TTL_SECS,
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            ttl_secs: std::env::var("JOB_STATUS_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(JOB_STATUS_TTL_SECS),
        }
    }
}

/// Redis-backed job status cache.
#[derive(Clone)]
pub struct StatusCacheClient {
    client: redis::Client,
    ttl_secs: u64,
}

impl StatusCacheClient {
    /// Create a new cache client. Connections are opened lazily.
    pub fn new(config: &CacheConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            ttl_secs: config.ttl_secs,
        })
    }

    /// Redis key for a job's cached status.
    pub fn key(job_id: &JobId) -> String {
        format!("job_status:{}", job_id)
    }

    /// Store the current status of a job.
    pub async fn set_job_status(&self, job_id: &JobId, status: JobStatus) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::key(job_id);

        conn.set_ex::<_, _, ()>(&key, status.as_str(), self.ttl_secs)
            .await?;

        debug!("Cached status {} for job {}", status, job_id);
        Ok(())
    }
}
