//! TTL cache store for third-party API responses.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use std::time::Duration;

use fanpulse_core::{CacheStore, Error, Result};

use crate::escape_like;

/// PostgreSQL implementation of [`CacheStore`].
///
/// Expiry is checked on read rather than by a background sweeper, so a hit
/// is never served past its TTL even if stale rows linger.
#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    /// Create a new cache store over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        let row = sqlx::query(
            "SELECT value FROM api_cache WHERE cache_key = $1 AND expires_at > $2",
        )
        .bind(key)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("value")))
    }

    async fn set(&self, key: &str, value: &JsonValue, ttl: Duration) -> Result<()> {
        let ttl = ChronoDuration::from_std(ttl)
            .map_err(|e| Error::InvalidInput(format!("Cache TTL out of range: {e}")))?;
        let expires_at = Utc::now() + ttl;

        sqlx::query(
            "INSERT INTO api_cache (cache_key, value, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (cache_key)
             DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM api_cache WHERE cache_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let pattern = format!("{}%", escape_like(prefix));
        let result = sqlx::query("DELETE FROM api_cache WHERE cache_key LIKE $1")
            .bind(pattern)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
