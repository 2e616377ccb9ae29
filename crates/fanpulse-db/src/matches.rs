//! Normalized match storage keyed by external identifier.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use fanpulse_core::{
    new_v7, AnalysisResult, Fixture, MatchRecord, MatchRepository, Result, UpsertOutcome,
};

/// PostgreSQL implementation of [`MatchRepository`].
#[derive(Clone)]
pub struct PgMatchRepository {
    pool: PgPool,
}

impl PgMatchRepository {
    /// Create a new match repository over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_match_row(row: sqlx::postgres::PgRow) -> MatchRecord {
        MatchRecord {
            id: row.get("id"),
            external_id: row.get("external_id"),
            home_team: row.get("home_team"),
            away_team: row.get("away_team"),
            kickoff_at: row.get("kickoff_at"),
            competition: row.get("competition"),
            analysis: row.get("analysis"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl MatchRepository for PgMatchRepository {
    async fn upsert_fixture(&self, fixture: &Fixture) -> Result<UpsertOutcome> {
        // xmax = 0 only for freshly inserted rows, which distinguishes
        // insert from conflict-update in a single round trip.
        let inserted: bool = sqlx::query_scalar(
            "INSERT INTO match_record
                 (id, external_id, home_team, away_team, kickoff_at, competition, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (external_id) DO UPDATE SET
                 home_team = EXCLUDED.home_team,
                 away_team = EXCLUDED.away_team,
                 kickoff_at = EXCLUDED.kickoff_at,
                 competition = EXCLUDED.competition,
                 updated_at = EXCLUDED.updated_at
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(new_v7())
        .bind(fixture.external_id)
        .bind(&fixture.home_team)
        .bind(&fixture.away_team)
        .bind(fixture.kickoff_at)
        .bind(&fixture.competition)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn list_unanalyzed(&self, limit: i64) -> Result<Vec<MatchRecord>> {
        let rows = sqlx::query(
            "SELECT id, external_id, home_team, away_team, kickoff_at, competition,
                    analysis, updated_at
             FROM match_record
             WHERE analysis IS NULL
             ORDER BY kickoff_at ASC NULLS LAST
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::parse_match_row).collect())
    }

    async fn set_analysis(&self, match_id: Uuid, analysis: &AnalysisResult) -> Result<()> {
        let analysis_json = serde_json::to_value(analysis)?;
        sqlx::query(
            "UPDATE match_record SET analysis = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(analysis_json)
        .bind(Utc::now())
        .bind(match_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
