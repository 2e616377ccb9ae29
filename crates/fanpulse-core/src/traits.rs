//! Core traits for fanpulse abstractions.
//!
//! These traits define the seams between the pipeline and its backing
//! services, enabling pluggable backends and testability. Postgres
//! implementations live in `fanpulse-db`; test doubles live beside the
//! code that exercises them.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Durable, multi-consumer job queue.
///
/// Implementations must guarantee the claim operation is atomic: a job id is
/// held by at most one worker at any instant, even with multiple worker
/// processes polling the same store.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Insert a new job in the waiting state; returns its id.
    async fn enqueue(&self, req: EnqueueRequest) -> Result<Uuid>;

    /// Atomically claim the next eligible job, moving it to active.
    ///
    /// Eligibility: waiting state, `run_after` passed, type in `job_types`
    /// (empty slice claims any type). Ordering: priority descending, then
    /// submission order.
    async fn claim_next(&self, job_types: &[JobType]) -> Result<Option<Job>>;

    /// Mark an active job completed, retaining its result.
    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Record a failure. Requeues with exponential backoff while attempts
    /// remain, otherwise marks the job permanently failed.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Fetch a job by id.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// List jobs in a given state, newest first.
    async fn list_by_status(&self, status: JobStatus, limit: i64) -> Result<Vec<Job>>;

    /// Counts by state.
    async fn stats(&self) -> Result<QueueStats>;

    /// Evict finished jobs beyond `keep_count`, oldest first. Waiting and
    /// active jobs are never evicted. Returns the number removed.
    async fn cleanup(&self, keep_count: i64) -> Result<i64>;
}

// =============================================================================
// CACHE + RATE BUDGET
// =============================================================================

/// Shared TTL cache for third-party API responses.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry; expired entries are never returned.
    async fn get(&self, key: &str) -> Result<Option<JsonValue>>;

    /// Store a value with a time-to-live.
    async fn set(&self, key: &str, value: &JsonValue, ttl: Duration) -> Result<()>;

    /// Remove one entry.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove all entries whose key starts with `prefix` (tag invalidation).
    /// Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;
}

/// Consumable request quota shared by all workers.
#[async_trait]
pub trait RateBudget: Send + Sync {
    /// Atomically consume `points` from the current window.
    ///
    /// Returns the consumed total after this call. When the window budget
    /// would be exceeded, fails with [`crate::Error::RateLimitExceeded`]
    /// and consumes nothing.
    async fn try_consume(&self, points: i32) -> Result<i32>;
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Storage for normalized match records.
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Insert or update a fixture keyed by its external match identifier.
    async fn upsert_fixture(&self, fixture: &Fixture) -> Result<UpsertOutcome>;

    /// Matches that do not yet carry an analysis, oldest kickoff first.
    async fn list_unanalyzed(&self, limit: i64) -> Result<Vec<MatchRecord>>;

    /// Attach an analysis to a match.
    async fn set_analysis(&self, match_id: Uuid, analysis: &AnalysisResult) -> Result<()>;
}

/// Vector similarity store for prior analyses and historical data.
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Insert or replace a knowledge record.
    async fn upsert(&self, record: &KnowledgeRecord) -> Result<()>;

    /// Nearest-neighbor search over live (non-expired) records.
    async fn search(&self, query: &Vector, k: i64) -> Result<Vec<KnowledgeHit>>;

    /// Delete records whose expiry has passed. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64>;
}

// =============================================================================
// INFERENCE BACKENDS
// =============================================================================

/// Text embedding backend.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for a batch of texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Embedding vector dimension.
    fn dimension(&self) -> usize;
}

/// Text generation backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for `prompt` under `system` instructions.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

// =============================================================================
// SCRAPING
// =============================================================================

/// Source of fixtures and standings data.
///
/// Implemented by the headless-browser engine and the feed API client;
/// stubbed in pipeline tests.
#[async_trait]
pub trait FixtureSource: Send + Sync {
    /// Acquire the underlying resource (browser launch). Called before the
    /// first scrape of a run; failure here means no scraping is possible.
    async fn ensure_ready(&self) -> Result<()>;

    /// Scrape upcoming fixtures. Zero rows is a valid (logged) result.
    async fn fetch_fixtures(&self) -> Result<Vec<Fixture>>;

    /// Scrape the current league standings.
    async fn fetch_standings(&self) -> Result<Vec<StandingRow>>;

    /// Release the shared browser resource. Idempotent.
    async fn shutdown(&self);
}
