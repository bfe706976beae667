//! Job repository.
//!
//! Jobs live in `tb_video_jobs` (created upstream by the API) and join
//! `tb_user` for the owner's email. Every status change also appends a row
//! to `tb_video_job_status_history` inside the same transaction, so the
//! history never disagrees with the job row.

use std::time::Instant;

use chrono::{NaiveDateTime, TimeZone, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use vproc_models::{Job, JobId, JobStatus, StatusTransition};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_query;

/// Row shape of the job lookup query.
#[derive(Debug, Clone, FromRow)]
struct JobRow {
    id: Uuid,
    status: String,
    created_at: NaiveDateTime,
    output_path: Option<String>,
    user_id: String,
    email: Option<String>,
    video_path: String,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> StoreResult<Self> {
        let status = JobStatus::parse(&row.status).ok_or_else(|| {
            StoreError::invalid_record(format!("job {} has unknown status '{}'", row.id, row.status))
        })?;

        Ok(Job {
            id: JobId::from_string(row.id.to_string()),
            status,
            created_at: Utc.from_utc_datetime(&row.created_at),
            input_reference: row.video_path,
            output_reference: row.output_path,
            user_id: row.user_id,
            email: row.email,
        })
    }
}

/// Repository for job records and their status history.
#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a job by ID.
    ///
    /// Returns [`StoreError::NotFound`] when no such job exists, including
    /// when the id is not a valid UUID.
    #[instrument(skip_all, fields(job_id = %job_id))]
    pub async fn fetch_job(&self, job_id: &JobId) -> StoreResult<Job> {
        let id = parse_job_uuid(job_id)?;
        let started = Instant::now();

        let result = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT
                j.id,
                j.status,
                j.created_at,
                j.output_path,
                j.user_id::text AS user_id,
                u.email,
                j.video_path
            FROM tb_video_jobs j
            LEFT JOIN tb_user u ON u.id = j.user_id
            WHERE j.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        record_query("fetch_job", result.is_ok(), started.elapsed().as_secs_f64());

        match result? {
            Some(row) => Job::try_from(row),
            None => Err(StoreError::not_found(job_id.as_str())),
        }
    }

    /// Persist the job's current status and output reference, appending
    /// `transition` to the history in the same transaction.
    #[instrument(skip_all, fields(job_id = %job.id, status = %transition.status))]
    pub async fn persist_status(
        &self,
        job: &Job,
        transition: &StatusTransition,
    ) -> StoreResult<()> {
        let id = parse_job_uuid(&job.id)?;
        let started = Instant::now();

        let result = self.write_transition(id, job, transition).await;

        record_query("persist_status", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    async fn write_transition(
        &self,
        id: Uuid,
        job: &Job,
        transition: &StatusTransition,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE tb_video_jobs
            SET status = $2, output_path = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(job.status.as_str())
        .bind(job.output_reference.as_deref())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::not_found(job.id.as_str()));
        }

        sqlx::query(
            r#"
            INSERT INTO tb_video_job_status_history (id, job_id, status, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(transition.id)
        .bind(id)
        .bind(transition.status.as_str())
        .bind(transition.recorded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!("Persisted status {} for job {}", transition.status, job.id);
        Ok(())
    }
}

/// Job ids are UUIDs in the database; anything else cannot match a row.
fn parse_job_uuid(job_id: &JobId) -> StoreResult<Uuid> {
    Uuid::parse_str(job_id.as_str()).map_err(|_| StoreError::not_found(job_id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, output: Option<&str>) -> JobRow {
        JobRow {
            id: Uuid::parse_str("7b0c6f2e-4d0e-4c9b-9a53-2f1f4d6b1a10").unwrap(),
            status: status.to_string(),
            created_at: NaiveDateTime::parse_from_str("2024-05-01 10:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            output_path: output.map(str::to_string),
            user_id: "42".to_string(),
            email: Some("owner@example.com".to_string()),
            video_path: "upload/video.mp4".to_string(),
        }
    }

    #[test]
    fn test_row_maps_to_job() {
        let job = Job::try_from(row("completed", Some("output/x.zip"))).unwrap();
        assert_eq!(job.id.as_str(), "7b0c6f2e-4d0e-4c9b-9a53-2f1f4d6b1a10");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.input_reference, "upload/video.mp4");
        assert_eq!(job.output_reference.as_deref(), Some("output/x.zip"));
        assert_eq!(job.email.as_deref(), Some("owner@example.com"));
        assert_eq!(job.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_unknown_status_is_invalid_record() {
        let err = Job::try_from(row("pending", None)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[test]
    fn test_non_uuid_job_id_is_not_found() {
        let err = parse_job_uuid(&JobId::from("job-123")).unwrap_err();
        assert!(err.is_not_found());

        assert!(parse_job_uuid(&JobId::from("7b0c6f2e-4d0e-4c9b-9a53-2f1f4d6b1a10")).is_ok());
    }
}
