//! Full synchronization pipeline.
//!
//! One handler services both scheduled and manual sync jobs: scrape
//! fixtures, scrape standings, analyze unprocessed matches, purge expired
//! knowledge. Step failures are captured into the report so a partial sync
//! still completes; only an unavailable browser aborts the job, feeding the
//! queue's retry backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, warn};

use fanpulse_core::{
    defaults, new_v7, EmbeddingBackend, FixtureSource, JobType, KnowledgeRecord,
    KnowledgeRepository, MatchRecord, MatchRepository, StandingRow, StandingsOutcome, SyncReport,
    SyncScope, UpsertOutcome,
};
use fanpulse_inference::AnalysisClient;

use crate::handler::{HandlerResult, JobContext, JobHandler};

/// Knowledge tag carried by standings snapshots.
pub const HISTORICAL_TAG: &str = "historical_data";

/// Tuning knobs for the analysis step.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Matches analyzed per run when the job scope sets no limit.
    pub batch_size: usize,
    /// Delay between consecutive analysis calls, in milliseconds.
    pub delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::ANALYSIS_BATCH_SIZE,
            delay_ms: defaults::ANALYSIS_DELAY_MS,
        }
    }
}

impl SyncConfig {
    /// Set the default analysis batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the inter-analysis delay.
    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }
}

/// Handler for `full-sync` and `manual-sync` jobs.
pub struct SyncHandler {
    source: Arc<dyn FixtureSource>,
    matches: Arc<dyn MatchRepository>,
    knowledge: Arc<dyn KnowledgeRepository>,
    embedder: Arc<dyn EmbeddingBackend>,
    analysis: Arc<AnalysisClient>,
    config: SyncConfig,
}

impl SyncHandler {
    /// Create a sync handler over the pipeline's backing services.
    pub fn new(
        source: Arc<dyn FixtureSource>,
        matches: Arc<dyn MatchRepository>,
        knowledge: Arc<dyn KnowledgeRepository>,
        embedder: Arc<dyn EmbeddingBackend>,
        analysis: Arc<AnalysisClient>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            matches,
            knowledge,
            embedder,
            analysis,
            config,
        }
    }

    /// Run every pipeline step, capturing failures into the report.
    async fn run_pipeline(&self, scope: &SyncScope) -> SyncReport {
        let start = Instant::now();
        let mut report = SyncReport::default();

        self.sync_fixtures(&mut report).await;
        self.sync_standings(&mut report).await;
        self.analyze_matches(scope, &mut report).await;

        match self.knowledge.purge_expired().await {
            Ok(purged) => report.purged = purged,
            Err(e) => {
                warn!(error = ?e, "Knowledge purge failed");
                report.errors += 1;
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    async fn sync_fixtures(&self, report: &mut SyncReport) {
        let fixtures = match self.source.fetch_fixtures().await {
            Ok(fixtures) => fixtures,
            Err(e) => {
                warn!(error = ?e, "Fixture scrape failed, continuing sync");
                report.errors += 1;
                return;
            }
        };

        report.scraped = fixtures.len();
        for fixture in &fixtures {
            match self.matches.upsert_fixture(fixture).await {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(e) => {
                    warn!(
                        external_id = fixture.external_id,
                        error = ?e,
                        "Fixture upsert failed"
                    );
                    report.errors += 1;
                }
            }
        }
    }

    async fn sync_standings(&self, report: &mut SyncReport) {
        let outcome = match self.source.fetch_standings().await {
            Ok(rows) => {
                let rows_count = rows.len();
                match self.store_standings(&rows).await {
                    Ok(()) => StandingsOutcome {
                        rows: rows_count,
                        error: None,
                    },
                    Err(e) => StandingsOutcome {
                        rows: rows_count,
                        error: Some(e.to_string()),
                    },
                }
            }
            Err(e) => StandingsOutcome {
                rows: 0,
                error: Some(e.to_string()),
            },
        };

        if let Some(error) = &outcome.error {
            warn!(%error, "Standings step failed, continuing sync");
        }
        report.standings = outcome;
    }

    async fn store_standings(&self, rows: &[StandingRow]) -> fanpulse_core::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let text = render_standings(rows);
        let mut vectors = self.embedder.embed_texts(&[text.clone()]).await?;
        if vectors.is_empty() {
            return Err(fanpulse_core::Error::Embedding(
                "Backend returned no embedding".into(),
            ));
        }

        let now = chrono::Utc::now();
        self.knowledge
            .upsert(&KnowledgeRecord {
                id: new_v7(),
                embedding: vectors.remove(0),
                payload: serde_json::json!({
                    "text": text,
                    "standings": rows,
                }),
                tag: HISTORICAL_TAG.to_string(),
                created_at: now,
                expires_at: Some(now + chrono::Duration::days(defaults::KNOWLEDGE_TTL_DAYS)),
            })
            .await
    }

    async fn analyze_matches(&self, scope: &SyncScope, report: &mut SyncReport) {
        let batch = scope.limit.unwrap_or(self.config.batch_size);
        let pending = match self.matches.list_unanalyzed(batch as i64).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = ?e, "Listing unanalyzed matches failed");
                report.errors += 1;
                return;
            }
        };

        for (idx, record) in pending.iter().enumerate() {
            let subject = analysis_subject(record);
            match self.analysis.analyze(&subject).await {
                Ok(result) => {
                    if result.parse_error {
                        warn!(
                            external_id = record.external_id,
                            "Stored degraded analysis (model output unparseable)"
                        );
                    }
                    match self.matches.set_analysis(record.id, &result).await {
                        Ok(()) => report.analyzed += 1,
                        Err(e) => {
                            warn!(external_id = record.external_id, error = ?e, "Storing analysis failed");
                            report.errors += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(external_id = record.external_id, error = ?e, "Analysis failed");
                    report.errors += 1;
                }
            }

            if idx + 1 < pending.len() && self.config.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }
        }
    }
}

#[async_trait]
impl JobHandler for SyncHandler {
    fn job_types(&self) -> &'static [JobType] {
        &[JobType::FullSync, JobType::ManualSync]
    }

    async fn execute(&self, ctx: JobContext) -> HandlerResult {
        let scope: SyncScope = match ctx.payload() {
            Some(payload) => match serde_json::from_value(payload.clone()) {
                Ok(scope) => scope,
                Err(e) => return HandlerResult::Failed(format!("Invalid sync payload: {e}")),
            },
            None => SyncScope::default(),
        };

        // No browser means no scraping at all; hand the job back to the
        // queue's backoff instead of producing an empty report.
        if let Err(e) = self.source.ensure_ready().await {
            return HandlerResult::Retry(format!("Scrape source unavailable: {e}"));
        }

        let report = self.run_pipeline(&scope).await;

        // Release the browser no matter which steps failed; the next run
        // relaunches it lazily.
        self.source.shutdown().await;

        info!(
            scraped = report.scraped,
            inserted = report.inserted,
            updated = report.updated,
            analyzed = report.analyzed,
            errors = report.errors,
            duration_ms = report.duration_ms,
            "Sync run finished"
        );

        match serde_json::to_value(&report) {
            Ok(json) => HandlerResult::Success(Some(json)),
            Err(e) => HandlerResult::Failed(format!("Failed to serialize sync report: {e}")),
        }
    }
}

fn analysis_subject(record: &MatchRecord) -> String {
    let mut subject = format!("{} vs {}", record.home_team, record.away_team);
    if let Some(competition) = &record.competition {
        subject.push_str(&format!(" ({competition})"));
    }
    if let Some(kickoff) = record.kickoff_at {
        subject.push_str(&format!(", kickoff {}", kickoff.format("%Y-%m-%d %H:%M UTC")));
    }
    subject
}

fn render_standings(rows: &[StandingRow]) -> String {
    let mut text = String::from("League standings:\n");
    for row in rows {
        text.push_str(&format!(
            "{}. {} P{} W{} D{} L{} Pts{}\n",
            row.position, row.team, row.played, row.won, row.drawn, row.lost, row.points
        ));
    }
    text
}
