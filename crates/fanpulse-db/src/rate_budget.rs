//! Shared rate budget backed by the queue store.
//!
//! The budget is an atomic counter per time window living in Postgres, not
//! in process memory: every worker process consumes from the same row, so
//! the window limit holds across the whole deployment.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;

use fanpulse_core::{defaults, Error, RateBudget, Result};

/// PostgreSQL implementation of [`RateBudget`].
#[derive(Clone)]
pub struct PgRateBudget {
    pool: PgPool,
    points_limit: i32,
    window_secs: i64,
}

impl PgRateBudget {
    /// Create a budget with the default limit and window.
    pub fn new(pool: PgPool) -> Self {
        Self::with_limits(pool, defaults::RATE_POINTS_LIMIT, defaults::RATE_WINDOW_SECS)
    }

    /// Create a budget with a custom point limit and window duration.
    pub fn with_limits(pool: PgPool, points_limit: i32, window_secs: i64) -> Self {
        Self {
            pool,
            points_limit,
            window_secs,
        }
    }

    /// Start of the window containing `now`, aligned to the window size.
    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = now.timestamp() - now.timestamp().rem_euclid(self.window_secs);
        Utc.timestamp_opt(secs, 0).single().unwrap_or(now)
    }
}

#[async_trait]
impl RateBudget for PgRateBudget {
    async fn try_consume(&self, points: i32) -> Result<i32> {
        let window_start = self.window_start(Utc::now());

        // Open the window row if this is its first request; on a fresh
        // window, drop rows from windows long past.
        let inserted = sqlx::query(
            "INSERT INTO rate_budget (window_start, points_consumed, points_limit)
             VALUES ($1, 0, $2)
             ON CONFLICT (window_start) DO NOTHING",
        )
        .bind(window_start)
        .bind(self.points_limit)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            sqlx::query("DELETE FROM rate_budget WHERE window_start < $1")
                .bind(window_start)
                .execute(&self.pool)
                .await?;
        }

        // Single conditional UPDATE: succeeds only while budget remains, so
        // concurrent consumers cannot overshoot the limit.
        let consumed: Option<i32> = sqlx::query_scalar(
            "UPDATE rate_budget
             SET points_consumed = points_consumed + $2
             WHERE window_start = $1 AND points_consumed + $2 <= points_limit
             RETURNING points_consumed",
        )
        .bind(window_start)
        .bind(points)
        .fetch_optional(&self.pool)
        .await?;

        match consumed {
            Some(total) => Ok(total),
            None => {
                let current: i32 = sqlx::query_scalar(
                    "SELECT points_consumed FROM rate_budget WHERE window_start = $1",
                )
                .bind(window_start)
                .fetch_one(&self.pool)
                .await?;
                Err(Error::RateLimitExceeded {
                    consumed: current,
                    limit: self.points_limit,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(window_secs: i64) -> PgRateBudget {
        // Window math needs no live pool.
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        PgRateBudget::with_limits(pool, 10, window_secs)
    }

    #[tokio::test]
    async fn test_window_start_alignment() {
        let b = budget(60);
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 45).unwrap();
        assert_eq!(
            b.window_start(t),
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_same_window_same_start() {
        let b = budget(60);
        let t1 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 1).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 59).unwrap();
        assert_eq!(b.window_start(t1), b.window_start(t2));
    }

    #[tokio::test]
    async fn test_adjacent_windows_differ() {
        let b = budget(60);
        let t1 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 59).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 31, 0).unwrap();
        assert_ne!(b.window_start(t1), b.window_start(t2));
    }
}
