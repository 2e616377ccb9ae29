//! # fanpulse-db
//!
//! PostgreSQL storage layer for the fanpulse sync pipeline.
//!
//! This crate provides:
//! - Connection pool management
//! - The durable job queue (atomic claim via `FOR UPDATE SKIP LOCKED`)
//! - TTL cache and shared rate budget for the sports-data API
//! - Match storage keyed by external identifier
//! - Vector knowledge store backed by pgvector
//!
//! ## Example
//!
//! ```rust,ignore
//! use fanpulse_db::Database;
//! use fanpulse_core::{EnqueueRequest, JobQueue, JobType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/fanpulse").await?;
//!     db.migrate().await?;
//!
//!     let job_id = db.jobs.enqueue(EnqueueRequest::new(JobType::FullSync)).await?;
//!     println!("queued {job_id}");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod jobs;
pub mod knowledge;
pub mod matches;
pub mod pool;
pub mod rate_budget;

// Re-export core types
pub use fanpulse_core::*;

pub use cache::PgCacheStore;
pub use jobs::PgJobQueue;
pub use knowledge::PgKnowledgeRepository;
pub use matches::PgMatchRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use rate_budget::PgRateBudget;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Aggregated handle over all repositories sharing one connection pool.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::PgPool,
    /// Durable job queue.
    pub jobs: PgJobQueue,
    /// TTL cache for third-party API responses.
    pub cache: PgCacheStore,
    /// Shared rate budget across all workers.
    pub rate_budget: PgRateBudget,
    /// Normalized match storage.
    pub matches: PgMatchRepository,
    /// Vector knowledge store.
    pub knowledge: PgKnowledgeRepository,
}

impl Database {
    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build repositories over an existing pool.
    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self {
            jobs: PgJobQueue::new(pool.clone()),
            cache: PgCacheStore::new(pool.clone()),
            rate_budget: PgRateBudget::new(pool.clone()),
            matches: PgMatchRepository::new(pool.clone()),
            knowledge: PgKnowledgeRepository::new(pool.clone()),
            pool,
        }
    }

    /// Run embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Ok(())
    }
}
