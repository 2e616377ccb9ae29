//! Pure job state machine.
//!
//! The queue store enforces these transitions in SQL; this module is the
//! canonical, storage-independent definition so the rules can be tested
//! without a database and reused by the in-memory queue.

use chrono::Duration;

/// Tagged job lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Queued, eligible for claiming.
    Waiting,
    /// Claimed by exactly one worker.
    Active,
    /// Finished successfully.
    Completed,
    /// Attempts exhausted; error retained.
    Failed { error: String },
}

/// Event applied to a job's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// A worker claimed the job.
    Claim,
    /// The handler finished successfully.
    Succeed,
    /// The handler failed; `attempts` counts completed attempts including
    /// this one, `max_attempts` is the job's ceiling.
    Fail {
        error: String,
        attempts: i32,
        max_attempts: i32,
    },
}

impl JobState {
    /// Apply an event, returning the next state.
    ///
    /// Invalid (state, event) pairs return the current state unchanged: the
    /// queue store guards transitions atomically, so an out-of-order event
    /// here means a stale observer, not a bug to propagate.
    pub fn transition(self, event: JobEvent) -> JobState {
        match (self, event) {
            (JobState::Waiting, JobEvent::Claim) => JobState::Active,
            (JobState::Active, JobEvent::Succeed) => JobState::Completed,
            (
                JobState::Active,
                JobEvent::Fail {
                    error,
                    attempts,
                    max_attempts,
                },
            ) => {
                if attempts < max_attempts {
                    JobState::Waiting
                } else {
                    JobState::Failed { error }
                }
            }
            (state, _) => state,
        }
    }

    /// True once the job can never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed { .. })
    }
}

/// Exponential backoff delay before the next attempt: `base * 2^attempt`.
///
/// `attempt` is the number of attempts already completed, so the first retry
/// waits exactly `base`.
pub fn backoff_delay(base_secs: i64, attempt: i32) -> Duration {
    let shift = attempt.clamp(0, 30) as u32;
    Duration::seconds(base_secs.saturating_mul(1i64 << shift))
}
