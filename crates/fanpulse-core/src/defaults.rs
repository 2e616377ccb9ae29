//! Centralized default constants for the fanpulse system.
//!
//! This module is the single source of truth for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default maximum attempts for a sync job.
pub const JOB_MAX_ATTEMPTS: i32 = 3;

/// Base delay for exponential retry backoff, in seconds.
pub const JOB_BACKOFF_BASE_SECS: i64 = 5;

/// Default polling interval when the queue is empty (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default number of worker instances (system-wide concurrency).
pub const WORKER_COUNT: usize = 2;

/// Per-job execution timeout in seconds.
pub const JOB_TIMEOUT_SECS: u64 = 1800;

/// Finished jobs retained before the oldest are evicted.
pub const JOB_KEEP_COUNT: i64 = 500;

/// Worker event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// SCHEDULER
// =============================================================================

/// Default scheduled sync interval in minutes.
pub const SYNC_INTERVAL_MINUTES: u64 = 60;

// =============================================================================
// RATE BUDGET
// =============================================================================

/// Default API points allowed per window.
pub const RATE_POINTS_LIMIT: i32 = 100;

/// Default rate window duration in seconds.
pub const RATE_WINDOW_SECS: i64 = 60;

// =============================================================================
// SCRAPER
// =============================================================================

/// Navigation/selector timeout per scraped page, in seconds.
pub const SCRAPE_TIMEOUT_SECS: u64 = 30;

/// Politeness delay enforced after every scrape, in milliseconds.
pub const SCRAPE_DELAY_MS: u64 = 2000;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// ANALYSIS PIPELINE
// =============================================================================

/// Matches analyzed per sync run.
pub const ANALYSIS_BATCH_SIZE: usize = 10;

/// Delay between successive inference calls, in milliseconds.
pub const ANALYSIS_DELAY_MS: u64 = 1000;

/// Prior records retrieved for RAG context.
pub const ANALYSIS_CONTEXT_K: i64 = 5;

/// Days before a stored analysis record expires from the knowledge store.
pub const KNOWLEDGE_TTL_DAYS: i64 = 30;

/// Characters kept from raw model output in a parse-failure fallback.
pub const FALLBACK_SUMMARY_LEN: usize = 500;
