//! Job handler trait and execution context.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use fanpulse_core::{Job, JobType};

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    /// Id of the job being processed.
    pub fn job_id(&self) -> Uuid {
        self.job.id
    }

    /// The job payload, if any.
    pub fn payload(&self) -> Option<&JsonValue> {
        self.job.payload.as_ref()
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum HandlerResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed; retried while attempts remain.
    Failed(String),
    /// Transient condition; retried while attempts remain.
    Retry(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job types this handler processes.
    fn job_types(&self) -> &'static [JobType];

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> HandlerResult;
}

/// No-op handler for testing.
pub struct NoOpHandler {
    job_types: &'static [JobType],
}

impl NoOpHandler {
    /// Create a no-op handler for the given job types.
    pub fn new(job_types: &'static [JobType]) -> Self {
        Self { job_types }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn job_types(&self) -> &'static [JobType] {
        self.job_types
    }

    async fn execute(&self, _ctx: JobContext) -> HandlerResult {
        HandlerResult::Success(None)
    }
}
