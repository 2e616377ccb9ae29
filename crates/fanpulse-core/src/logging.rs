//! Structured logging field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |

/// Subsystem originating the log event.
/// Values: "jobs", "scheduler", "feed", "scraper", "inference", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "worker", "pool", "ollama", "engine"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "claim_next", "request", "scrape_fixtures", "generate"
pub const OPERATION: &str = "op";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type enum variant.
pub const JOB_TYPE: &str = "job_type";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of records produced by a scrape or query.
pub const RESULT_COUNT: &str = "result_count";

/// Cache key involved in a feed request.
pub const CACHE_KEY: &str = "cache_key";

/// External match identifier.
pub const EXTERNAL_ID: &str = "external_id";
