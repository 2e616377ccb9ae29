//! [`FixtureSource`] backed by the sports-data API.
//!
//! Alternative to the headless scraper for deployments holding an API
//! token. Responses flow through the cache-aside client, so repeated syncs
//! inside an endpoint's TTL cost no rate budget.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use fanpulse_core::{Fixture, FixtureSource, Result, StandingRow};

use crate::client::FeedClient;
use crate::endpoints::FeedEndpoint;

/// Fixture and standings source reading from the sports-data API.
pub struct FeedSource {
    client: FeedClient,
}

impl FeedSource {
    pub fn new(client: FeedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FixtureSource for FeedSource {
    async fn ensure_ready(&self) -> Result<()> {
        // Nothing to launch; readiness is the API answering, which the
        // fetch itself establishes.
        Ok(())
    }

    async fn fetch_fixtures(&self) -> Result<Vec<Fixture>> {
        let data = self.client.fetch(FeedEndpoint::Fixtures, &[]).await?;
        let fixtures = parse_fixtures(&data);
        info!(
            subsystem = "feed",
            component = "source",
            op = "fetch_fixtures",
            result_count = fixtures.len(),
            "Fetched fixtures from API"
        );
        Ok(fixtures)
    }

    async fn fetch_standings(&self) -> Result<Vec<StandingRow>> {
        let data = self.client.fetch(FeedEndpoint::Standings, &[]).await?;
        let rows = parse_standings(&data);
        info!(
            subsystem = "feed",
            component = "source",
            op = "fetch_standings",
            result_count = rows.len(),
            "Fetched standings from API"
        );
        Ok(rows)
    }

    async fn shutdown(&self) {}
}

/// Extract fixtures from a feed response, skipping malformed entries.
fn parse_fixtures(data: &JsonValue) -> Vec<Fixture> {
    let Some(entries) = data.get("fixtures").and_then(JsonValue::as_array) else {
        warn!(
            subsystem = "feed",
            component = "source",
            "Fixtures response carried no fixtures array"
        );
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let external_id = entry.get("id")?.as_i64()?;
            let home_team = entry.get("home")?.as_str()?.to_string();
            let away_team = entry.get("away")?.as_str()?.to_string();
            Some(Fixture {
                external_id,
                home_team,
                away_team,
                kickoff_at: entry
                    .get("kickoff")
                    .and_then(JsonValue::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                competition: entry
                    .get("competition")
                    .and_then(JsonValue::as_str)
                    .map(String::from),
            })
        })
        .collect()
}

/// Extract standing rows from a feed response, skipping malformed entries.
fn parse_standings(data: &JsonValue) -> Vec<StandingRow> {
    let Some(entries) = data.get("standings").and_then(JsonValue::as_array) else {
        warn!(
            subsystem = "feed",
            component = "source",
            "Standings response carried no standings array"
        );
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let int = |field: &str| entry.get(field).and_then(JsonValue::as_i64);
            Some(StandingRow {
                position: int("position")? as i32,
                team: entry.get("team")?.as_str()?.to_string(),
                played: int("played")? as i32,
                won: int("won")? as i32,
                drawn: int("drawn")? as i32,
                lost: int("lost")? as i32,
                points: int("points")? as i32,
            })
        })
        .collect()
}
