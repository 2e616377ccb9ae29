//! In-memory job queue.
//!
//! Mirrors the Postgres queue semantics (priority ordering, backoff
//! requeue, bounded retention) without a database, for integration tests
//! and local development.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use fanpulse_core::{
    backoff_delay, new_v7, EnqueueRequest, Error, Job, JobQueue, JobStatus, JobType, QueueStats,
    Result,
};

/// In-memory implementation of [`JobQueue`].
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<Vec<Job>>,
}

impl MemoryJobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, req: EnqueueRequest) -> Result<Uuid> {
        let now = Utc::now();
        let job = Job {
            id: new_v7(),
            job_type: req.job_type,
            status: JobStatus::Waiting,
            priority: req.priority,
            payload: req.payload,
            result: None,
            error_message: None,
            attempts: 0,
            max_attempts: req.max_attempts,
            backoff_base_secs: req.backoff_base_secs,
            created_at: now,
            run_after: now,
            started_at: None,
            completed_at: None,
        };
        let id = job.id;
        self.jobs.lock().unwrap().push(job);
        Ok(id)
    }

    async fn claim_next(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();

        // Highest priority first, then submission order.
        let next = jobs
            .iter_mut()
            .filter(|j| {
                j.status == JobStatus::Waiting
                    && j.run_after <= now
                    && (job_types.is_empty() || job_types.contains(&j.job_type))
            })
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
            });

        Ok(next.map(|job| {
            job.status = JobStatus::Active;
            job.started_at = Some(now);
            job.clone()
        }))
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::NotFound(format!("Job {job_id}")))?;
        job.status = JobStatus::Completed;
        job.result = result;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::NotFound(format!("Job {job_id}")))?;

        job.error_message = Some(error.to_string());
        if job.attempts + 1 < job.max_attempts {
            let delay = backoff_delay(job.backoff_base_secs, job.attempts);
            job.attempts += 1;
            job.status = JobStatus::Waiting;
            job.run_after = now + delay;
            job.started_at = None;
        } else {
            job.attempts += 1;
            job.status = JobStatus::Failed;
            job.completed_at = Some(now);
        }
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == job_id)
            .cloned())
    }

    async fn list_by_status(&self, status: JobStatus, limit: i64) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        let mut matching: Vec<Job> = jobs.iter().filter(|j| j.status == status).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn stats(&self) -> Result<QueueStats> {
        let jobs = self.jobs.lock().unwrap();
        let mut stats = QueueStats {
            total: jobs.len() as i64,
            ..Default::default()
        };
        for job in jobs.iter() {
            match job.status {
                JobStatus::Waiting => stats.waiting += 1,
                JobStatus::Active => stats.active += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn cleanup(&self, keep_count: i64) -> Result<i64> {
        let mut jobs = self.jobs.lock().unwrap();

        let mut finished: Vec<(Uuid, Option<chrono::DateTime<Utc>>)> = jobs
            .iter()
            .filter(|j| matches!(j.status, JobStatus::Completed | JobStatus::Failed))
            .map(|j| (j.id, j.completed_at))
            .collect();
        finished.sort_by(|a, b| b.1.cmp(&a.1));

        let evict: Vec<Uuid> = finished
            .into_iter()
            .skip(keep_count.max(0) as usize)
            .map(|(id, _)| id)
            .collect();

        let before = jobs.len();
        jobs.retain(|j| !evict.contains(&j.id));
        Ok((before - jobs.len()) as i64)
    }
}
