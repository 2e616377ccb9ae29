//! Domain models for the fanpulse sync pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub use pgvector::Vector;

// =============================================================================
// JOBS
// =============================================================================

/// Kind of synchronization work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Scheduled full synchronization (scrape + analyze + cleanup).
    FullSync,
    /// Operator-triggered synchronization, serviced ahead of scheduled work.
    ManualSync,
}

impl JobType {
    /// Queue priority class for this job type. Manual triggers preempt the
    /// scheduled FIFO stream.
    pub fn default_priority(&self) -> i32 {
        match self {
            JobType::FullSync => 0,
            JobType::ManualSync => 10,
        }
    }

    /// Stable string form used in the queue store.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullSync => "full_sync",
            JobType::ManualSync => "manual_sync",
        }
    }

    /// Parse the queue-store string form.
    pub fn parse(s: &str) -> Option<JobType> {
        match s {
            "full_sync" => Some(JobType::FullSync),
            "manual_sync" => Some(JobType::ManualSync),
            _ => None,
        }
    }
}

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued and eligible for claiming once `run_after` has passed.
    Waiting,
    /// Claimed by exactly one worker.
    Active,
    /// Finished successfully; result retained.
    Completed,
    /// Attempts exhausted; error retained for inspection.
    Failed,
}

impl JobStatus {
    /// Stable string form used in the queue store.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the queue-store string form.
    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "waiting" => Some(JobStatus::Waiting),
            "active" => Some(JobStatus::Active),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// One unit of enqueued work.
///
/// Owned by the queue until claimed by exactly one worker. Within a priority
/// class jobs are serviced in submission order; a higher priority class is
/// always serviced first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: Option<JsonValue>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    /// Completed retry attempts so far.
    pub attempts: i32,
    pub max_attempts: i32,
    /// Base delay for exponential backoff, in seconds.
    pub backoff_base_secs: i64,
    pub created_at: DateTime<Utc>,
    /// Earliest instant the job may be claimed (moved forward on retry).
    pub run_after: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Parameters for enqueueing a job.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub job_type: JobType,
    pub payload: Option<JsonValue>,
    pub priority: i32,
    pub max_attempts: i32,
    pub backoff_base_secs: i64,
}

impl EnqueueRequest {
    /// Enqueue request with the type's default priority and retry policy.
    pub fn new(job_type: JobType) -> Self {
        Self {
            job_type,
            payload: None,
            priority: job_type.default_priority(),
            max_attempts: crate::defaults::JOB_MAX_ATTEMPTS,
            backoff_base_secs: crate::defaults::JOB_BACKOFF_BASE_SECS,
        }
    }

    /// Attach a JSON payload.
    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Override the priority class.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Counts of jobs by state, for operator inspection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub total: i64,
}

// =============================================================================
// SCRAPED RECORDS
// =============================================================================

/// A fixture extracted from a scraped page, normalized for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    /// External match identifier from the source site. Upsert key.
    pub external_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub kickoff_at: Option<DateTime<Utc>>,
    pub competition: Option<String>,
}

/// One row of a league table extracted from a scraped page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingRow {
    pub position: i32,
    pub team: String,
    pub played: i32,
    pub won: i32,
    pub drawn: i32,
    pub lost: i32,
    pub points: i32,
}

/// Whether a fixture upsert inserted a new row or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// A stored match awaiting or carrying an analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    pub external_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub kickoff_at: Option<DateTime<Utc>>,
    pub competition: Option<String>,
    pub analysis: Option<JsonValue>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// KNOWLEDGE STORE
// =============================================================================

/// An embedded record in the vector knowledge store.
#[derive(Debug, Clone)]
pub struct KnowledgeRecord {
    pub id: Uuid,
    pub embedding: Vector,
    pub payload: JsonValue,
    /// Classification tag, e.g. `match_analysis` or `historical_data`.
    pub tag: String,
    pub created_at: DateTime<Utc>,
    /// Lazily purged once passed; `None` means the record never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// A nearest-neighbor hit from the knowledge store.
#[derive(Debug, Clone)]
pub struct KnowledgeHit {
    /// Cosine similarity score in [0, 1], higher is closer.
    pub score: f64,
    pub payload: JsonValue,
    pub tag: String,
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// Predicted outcome attached to an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub outcome: String,
    /// Always clamped into [0, 1].
    pub confidence: f64,
    pub reasoning: String,
}

/// Structured output of the AI analysis step.
///
/// `parse_error` is set when the model response could not be parsed and the
/// remaining fields hold the degraded fallback. Callers must treat such a
/// value as valid but low-confidence output, never as a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub tactical_analysis: Option<String>,
    #[serde(default)]
    pub prediction: Option<Prediction>,
    #[serde(default)]
    pub parse_error: bool,
}

// =============================================================================
// SYNC PIPELINE
// =============================================================================

/// Optional scope parameters for a sync job, carried in the job payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncScope {
    /// Season identifier to sync; `None` means the current season.
    #[serde(default)]
    pub season: Option<String>,
    /// Cap on the number of matches analyzed in one run.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Outcome of the standings step inside a sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandingsOutcome {
    /// Number of standing rows captured.
    pub rows: usize,
    /// Error text if the step failed; the run itself continues.
    #[serde(default)]
    pub error: Option<String>,
}

/// Structured summary returned as a sync job's result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Fixtures scraped (inserted + updated).
    pub scraped: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Matches successfully analyzed this run.
    pub analyzed: usize,
    /// Per-step failures recorded without aborting the run.
    pub errors: usize,
    pub standings: StandingsOutcome,
    /// Expired knowledge records purged.
    pub purged: u64,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_round_trip() {
        for jt in [JobType::FullSync, JobType::ManualSync] {
            assert_eq!(JobType::parse(jt.as_str()), Some(jt));
        }
        assert_eq!(JobType::parse("unknown"), None);
    }

    #[test]
    fn test_job_status_round_trip() {
        for st in [
            JobStatus::Waiting,
            JobStatus::Active,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(st.as_str()), Some(st));
        }
        assert_eq!(JobStatus::parse(""), None);
    }

    #[test]
    fn test_manual_sync_outranks_full_sync() {
        assert!(JobType::ManualSync.default_priority() > JobType::FullSync.default_priority());
    }

    #[test]
    fn test_enqueue_request_defaults() {
        let req = EnqueueRequest::new(JobType::FullSync);
        assert_eq!(req.priority, 0);
        assert_eq!(req.max_attempts, 3);
        assert_eq!(req.backoff_base_secs, 5);
        assert!(req.payload.is_none());
    }

    #[test]
    fn test_enqueue_request_builder() {
        let req = EnqueueRequest::new(JobType::ManualSync)
            .with_payload(serde_json::json!({"limit": 5}))
            .with_priority(20);
        assert_eq!(req.priority, 20);
        assert_eq!(req.payload.unwrap()["limit"], 5);
    }

    #[test]
    fn test_sync_report_serialization() {
        let report = SyncReport {
            scraped: 3,
            inserted: 2,
            updated: 1,
            analyzed: 3,
            errors: 0,
            standings: StandingsOutcome {
                rows: 20,
                error: None,
            },
            purged: 4,
            duration_ms: 1234,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["scraped"], 3);
        assert_eq!(json["standings"]["rows"], 20);
        let back: SyncReport = serde_json::from_value(json).unwrap();
        assert_eq!(back.analyzed, 3);
    }

    #[test]
    fn test_analysis_result_partial_deserialization() {
        // Model output frequently omits optional sections.
        let result: AnalysisResult = serde_json::from_str(r#"{"summary":"ok"}"#).unwrap();
        assert_eq!(result.summary, "ok");
        assert!(result.insights.is_empty());
        assert!(result.prediction.is_none());
        assert!(!result.parse_error);
    }
}
