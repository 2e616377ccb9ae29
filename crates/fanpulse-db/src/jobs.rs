//! Durable job queue implementation.
//!
//! Claims use `FOR UPDATE SKIP LOCKED` so concurrent worker processes never
//! double-claim a job. Retry backoff is applied by pushing `run_after`
//! forward on failure; the claim query ignores jobs whose delay has not yet
//! elapsed.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use fanpulse_core::{
    backoff_delay, new_v7, EnqueueRequest, Error, Job, JobQueue, JobStatus, JobType, QueueStats,
    Result,
};

const JOB_COLUMNS: &str = "id, job_type, status, priority, payload, result, error_message, \
     attempts, max_attempts, backoff_base_secs, created_at, run_after, started_at, completed_at";

/// PostgreSQL implementation of [`JobQueue`].
#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    /// Create a new queue over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_job_row(row: sqlx::postgres::PgRow) -> Result<Job> {
        let job_type: String = row.get("job_type");
        let status: String = row.get("status");
        Ok(Job {
            id: row.get("id"),
            job_type: JobType::parse(&job_type)
                .ok_or_else(|| Error::Job(format!("Unknown job type in store: {job_type}")))?,
            status: JobStatus::parse(&status)
                .ok_or_else(|| Error::Job(format!("Unknown job status in store: {status}")))?,
            priority: row.get("priority"),
            payload: row.get("payload"),
            result: row.get("result"),
            error_message: row.get("error_message"),
            attempts: row.get("attempts"),
            max_attempts: row.get("max_attempts"),
            backoff_base_secs: row.get("backoff_base_secs"),
            created_at: row.get("created_at"),
            run_after: row.get("run_after"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, req: EnqueueRequest) -> Result<Uuid> {
        let job_id = new_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO sync_job
                 (id, job_type, status, priority, payload, max_attempts,
                  backoff_base_secs, created_at, run_after)
             VALUES ($1, $2, 'waiting', $3, $4, $5, $6, $7, $7)",
        )
        .bind(job_id)
        .bind(req.job_type.as_str())
        .bind(req.priority)
        .bind(&req.payload)
        .bind(req.max_attempts)
        .bind(req.backoff_base_secs)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(job_id)
    }

    async fn claim_next(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let now = Utc::now();
        let type_strings: Vec<String> = job_types
            .iter()
            .map(|jt| jt.as_str().to_string())
            .collect();

        // SKIP LOCKED keeps concurrent claimers from blocking on (or
        // double-claiming) the same row. Empty type array claims any type.
        let query = format!(
            "UPDATE sync_job
             SET status = 'active', started_at = $1
             WHERE id = (
                 SELECT id FROM sync_job
                 WHERE status = 'waiting'
                   AND run_after <= $1
                   AND (cardinality($2::text[]) = 0 OR job_type = ANY($2))
                 ORDER BY priority DESC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(now)
            .bind(&type_strings)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE sync_job
             SET status = 'completed', completed_at = $1, result = $2
             WHERE id = $3 AND status = 'active'",
        )
        .bind(now)
        .bind(&result)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let (attempts, max_attempts, backoff_base_secs): (i32, i32, i64) = sqlx::query_as(
            "SELECT attempts, max_attempts, backoff_base_secs
             FROM sync_job WHERE id = $1 FOR UPDATE",
        )
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;

        if attempts + 1 < max_attempts {
            // Requeue with exponential backoff; the delay for the first
            // retry is exactly the base.
            let run_after = now + backoff_delay(backoff_base_secs, attempts);
            sqlx::query(
                "UPDATE sync_job
                 SET status = 'waiting', attempts = attempts + 1, error_message = $1,
                     run_after = $2, started_at = NULL
                 WHERE id = $3",
            )
            .bind(error)
            .bind(run_after)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        } else {
            // Attempts exhausted: terminal failure, error retained.
            sqlx::query(
                "UPDATE sync_job
                 SET status = 'failed', attempts = attempts + 1, error_message = $1,
                     completed_at = $2
                 WHERE id = $3",
            )
            .bind(error)
            .bind(now)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let query = format!("SELECT {JOB_COLUMNS} FROM sync_job WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::parse_job_row).transpose()
    }

    async fn list_by_status(&self, status: JobStatus, limit: i64) -> Result<Vec<Job>> {
        let query = format!(
            "SELECT {JOB_COLUMNS} FROM sync_job
             WHERE status = $1
             ORDER BY created_at DESC
             LIMIT $2"
        );
        let rows = sqlx::query(&query)
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::parse_job_row).collect()
    }

    async fn stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'waiting') AS waiting,
                COUNT(*) FILTER (WHERE status = 'active') AS active,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) AS total
             FROM sync_job",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            waiting: row.get::<i64, _>("waiting"),
            active: row.get::<i64, _>("active"),
            completed: row.get::<i64, _>("completed"),
            failed: row.get::<i64, _>("failed"),
            total: row.get::<i64, _>("total"),
        })
    }

    async fn cleanup(&self, keep_count: i64) -> Result<i64> {
        let result = sqlx::query(
            "DELETE FROM sync_job
             WHERE status IN ('completed', 'failed')
               AND id NOT IN (
                 SELECT id FROM sync_job
                 WHERE status IN ('completed', 'failed')
                 ORDER BY completed_at DESC NULLS LAST
                 LIMIT $1
             )",
        )
        .bind(keep_count)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as i64)
    }
}
