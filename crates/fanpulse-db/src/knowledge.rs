//! Vector knowledge store backed by pgvector.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};

use fanpulse_core::{KnowledgeHit, KnowledgeRecord, KnowledgeRepository, Result, Vector};

/// PostgreSQL + pgvector implementation of [`KnowledgeRepository`].
#[derive(Clone)]
pub struct PgKnowledgeRepository {
    pool: PgPool,
}

impl PgKnowledgeRepository {
    /// Create a new knowledge repository over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeRepository for PgKnowledgeRepository {
    async fn upsert(&self, record: &KnowledgeRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO knowledge_record (id, embedding, payload, tag, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE SET
                 embedding = EXCLUDED.embedding,
                 payload = EXCLUDED.payload,
                 tag = EXCLUDED.tag,
                 expires_at = EXCLUDED.expires_at",
        )
        .bind(record.id)
        .bind(&record.embedding)
        .bind(&record.payload)
        .bind(&record.tag)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search(&self, query: &Vector, k: i64) -> Result<Vec<KnowledgeHit>> {
        // Cosine distance operator; expired records are excluded here and
        // removed for real by purge_expired.
        let rows = sqlx::query(
            "SELECT 1.0 - (embedding <=> $1::vector) AS score, payload, tag
             FROM knowledge_record
             WHERE expires_at IS NULL OR expires_at > $2
             ORDER BY embedding <=> $1::vector
             LIMIT $3",
        )
        .bind(query)
        .bind(Utc::now())
        .bind(k)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| KnowledgeHit {
                score: row.get("score"),
                payload: row.get("payload"),
                tag: row.get("tag"),
            })
            .collect())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM knowledge_record WHERE expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
