//! End-to-end sync pipeline tests with stubbed scrape and storage backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use fanpulse_core::{
    new_v7, AnalysisResult, EnqueueRequest, Error, Fixture, FixtureSource, JobQueue, JobStatus,
    JobType, KnowledgeHit, KnowledgeRecord, KnowledgeRepository, MatchRecord, MatchRepository,
    Result, StandingRow, SyncReport, UpsertOutcome, Vector,
};
use fanpulse_inference::{AnalysisClient, MockInferenceBackend};
use fanpulse_jobs::{
    HandlerResult, JobContext, JobHandler, JobWorker, MemoryJobQueue, SyncConfig, SyncHandler,
    WorkerConfig, WorkerEvent,
};

// =============================================================================
// STUBS
// =============================================================================

struct StubSource {
    fixtures: Result<Vec<Fixture>>,
    standings: Result<Vec<StandingRow>>,
    ready: bool,
    shutdowns: AtomicUsize,
}

impl StubSource {
    fn new(fixtures: Vec<Fixture>, standings: Vec<StandingRow>) -> Self {
        Self {
            fixtures: Ok(fixtures),
            standings: Ok(standings),
            ready: true,
            shutdowns: AtomicUsize::new(0),
        }
    }

    fn failing_standings(mut self, error: &str) -> Self {
        self.standings = Err(Error::Scrape(error.to_string()));
        self
    }

    fn unavailable() -> Self {
        Self {
            fixtures: Ok(vec![]),
            standings: Ok(vec![]),
            ready: false,
            shutdowns: AtomicUsize::new(0),
        }
    }
}

fn clone_result<T: Clone>(r: &Result<T>) -> Result<T> {
    match r {
        Ok(v) => Ok(v.clone()),
        Err(e) => Err(Error::Scrape(e.to_string())),
    }
}

#[async_trait]
impl FixtureSource for StubSource {
    async fn ensure_ready(&self) -> Result<()> {
        if self.ready {
            Ok(())
        } else {
            Err(Error::Scrape("Failed to launch browser".into()))
        }
    }

    async fn fetch_fixtures(&self) -> Result<Vec<Fixture>> {
        clone_result(&self.fixtures)
    }

    async fn fetch_standings(&self) -> Result<Vec<StandingRow>> {
        clone_result(&self.standings)
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct StubMatches {
    records: Mutex<HashMap<i64, MatchRecord>>,
}

impl StubMatches {
    fn seeded(fixtures: &[Fixture]) -> Self {
        let stub = Self::default();
        {
            let mut records = stub.records.lock().unwrap();
            for f in fixtures {
                records.insert(f.external_id, record_from(f));
            }
        }
        stub
    }
}

fn record_from(fixture: &Fixture) -> MatchRecord {
    MatchRecord {
        id: new_v7(),
        external_id: fixture.external_id,
        home_team: fixture.home_team.clone(),
        away_team: fixture.away_team.clone(),
        kickoff_at: fixture.kickoff_at,
        competition: fixture.competition.clone(),
        analysis: None,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl MatchRepository for StubMatches {
    async fn upsert_fixture(&self, fixture: &Fixture) -> Result<UpsertOutcome> {
        let mut records = self.records.lock().unwrap();
        if let Some(existing) = records.get_mut(&fixture.external_id) {
            existing.home_team = fixture.home_team.clone();
            existing.away_team = fixture.away_team.clone();
            existing.updated_at = Utc::now();
            Ok(UpsertOutcome::Updated)
        } else {
            records.insert(fixture.external_id, record_from(fixture));
            Ok(UpsertOutcome::Inserted)
        }
    }

    async fn list_unanalyzed(&self, limit: i64) -> Result<Vec<MatchRecord>> {
        let records = self.records.lock().unwrap();
        let mut pending: Vec<MatchRecord> = records
            .values()
            .filter(|r| r.analysis.is_none())
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.external_id);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn set_analysis(&self, match_id: uuid::Uuid, analysis: &AnalysisResult) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .values_mut()
            .find(|r| r.id == match_id)
            .ok_or_else(|| Error::NotFound(format!("Match {match_id}")))?;
        record.analysis = Some(serde_json::to_value(analysis)?);
        Ok(())
    }
}

#[derive(Default)]
struct StubKnowledge {
    records: Mutex<Vec<KnowledgeRecord>>,
}

#[async_trait]
impl KnowledgeRepository for StubKnowledge {
    async fn upsert(&self, record: &KnowledgeRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn search(&self, _query: &Vector, k: i64) -> Result<Vec<KnowledgeHit>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .take(k as usize)
            .map(|r| KnowledgeHit {
                score: 0.8,
                payload: r.payload.clone(),
                tag: r.tag.clone(),
            })
            .collect())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.expires_at.map(|e| e > now).unwrap_or(true));
        Ok((before - records.len()) as u64)
    }
}

// =============================================================================
// WIRING
// =============================================================================

struct Pipeline {
    source: Arc<StubSource>,
    matches: Arc<StubMatches>,
    knowledge: Arc<StubKnowledge>,
    handler: SyncHandler,
}

fn pipeline(source: StubSource, matches: StubMatches) -> Pipeline {
    let source = Arc::new(source);
    let matches = Arc::new(matches);
    let knowledge = Arc::new(StubKnowledge::default());
    let backend = Arc::new(MockInferenceBackend::new().with_response(
        r#"{"summary": "Home side favored", "insights": ["good form"],
            "prediction": {"outcome": "home_win", "confidence": 0.7, "reasoning": "form"}}"#,
    ));

    let analysis = Arc::new(AnalysisClient::new(
        backend.clone(),
        backend,
        knowledge.clone(),
    ));

    let handler = SyncHandler::new(
        source.clone(),
        matches.clone(),
        knowledge.clone(),
        Arc::new(MockInferenceBackend::new()),
        analysis,
        SyncConfig::default().with_delay_ms(0),
    );

    Pipeline {
        source,
        matches,
        knowledge,
        handler,
    }
}

fn fixture(id: i64, home: &str, away: &str) -> Fixture {
    Fixture {
        external_id: id,
        home_team: home.to_string(),
        away_team: away.to_string(),
        kickoff_at: None,
        competition: Some("Premier League".to_string()),
    }
}

fn standings() -> Vec<StandingRow> {
    vec![
        StandingRow {
            position: 1,
            team: "Arsenal".to_string(),
            played: 10,
            won: 8,
            drawn: 1,
            lost: 1,
            points: 25,
        },
        StandingRow {
            position: 2,
            team: "Liverpool".to_string(),
            played: 10,
            won: 7,
            drawn: 2,
            lost: 1,
            points: 23,
        },
    ]
}

fn sync_job(payload: Option<serde_json::Value>) -> fanpulse_core::Job {
    fanpulse_core::Job {
        id: new_v7(),
        job_type: JobType::FullSync,
        status: JobStatus::Active,
        priority: 0,
        payload,
        result: None,
        error_message: None,
        attempts: 0,
        max_attempts: 3,
        backoff_base_secs: 5,
        created_at: Utc::now(),
        run_after: Utc::now(),
        started_at: Some(Utc::now()),
        completed_at: None,
    }
}

fn report_of(result: HandlerResult) -> SyncReport {
    match result {
        HandlerResult::Success(Some(json)) => serde_json::from_value(json).unwrap(),
        other => panic!("expected success with report, got {other:?}"),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn test_full_sync_happy_path() {
    let fixtures = vec![
        fixture(1, "Arsenal", "Chelsea"),
        fixture(2, "Liverpool", "Everton"),
        fixture(3, "Leeds", "Burnley"),
    ];
    // Fixture 2 already exists, so it updates instead of inserting.
    let p = pipeline(
        StubSource::new(fixtures.clone(), standings()),
        StubMatches::seeded(&fixtures[1..2]),
    );

    let result = p.handler.execute(JobContext::new(sync_job(None))).await;
    let report = report_of(result);

    assert_eq!(report.scraped, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.analyzed, 3);
    assert_eq!(report.errors, 0);
    assert_eq!(report.standings.rows, 2);
    assert!(report.standings.error.is_none());

    // Every match now carries an analysis.
    let pending = p.matches.list_unanalyzed(10).await.unwrap();
    assert!(pending.is_empty());

    // Standings snapshot plus one stored record per successful analysis.
    let knowledge = p.knowledge.records.lock().unwrap();
    assert_eq!(
        knowledge
            .iter()
            .filter(|r| r.tag == "historical_data")
            .count(),
        1
    );
    assert_eq!(
        knowledge.iter().filter(|r| r.tag == "match_analysis").count(),
        3
    );
    drop(knowledge);

    // Browser released exactly once per run.
    assert_eq!(p.source.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_standings_failure_does_not_abort_the_run() {
    let fixtures = vec![fixture(1, "Arsenal", "Chelsea")];
    let p = pipeline(
        StubSource::new(fixtures, standings()).failing_standings("selector timeout"),
        StubMatches::default(),
    );

    let result = p.handler.execute(JobContext::new(sync_job(None))).await;
    let report = report_of(result);

    assert_eq!(report.inserted, 1);
    assert_eq!(report.analyzed, 1);
    assert_eq!(report.standings.rows, 0);
    assert!(report
        .standings
        .error
        .as_deref()
        .unwrap()
        .contains("selector timeout"));
    assert_eq!(p.source.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_scrape_completes_with_zero_counts() {
    let p = pipeline(StubSource::new(vec![], vec![]), StubMatches::default());

    let result = p.handler.execute(JobContext::new(sync_job(None))).await;
    let report = report_of(result);

    assert_eq!(report.scraped, 0);
    assert_eq!(report.inserted, 0);
    assert_eq!(report.analyzed, 0);
    assert_eq!(report.errors, 0);
}

#[tokio::test]
async fn test_scope_limit_bounds_analysis_batch() {
    let fixtures: Vec<Fixture> = (1..=5)
        .map(|i| fixture(i, &format!("Home{i}"), &format!("Away{i}")))
        .collect();
    let p = pipeline(
        StubSource::new(fixtures, vec![]),
        StubMatches::default(),
    );

    let payload = serde_json::json!({"limit": 2});
    let result = p
        .handler
        .execute(JobContext::new(sync_job(Some(payload))))
        .await;
    let report = report_of(result);

    assert_eq!(report.scraped, 5);
    assert_eq!(report.analyzed, 2);
    assert_eq!(p.matches.list_unanalyzed(10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_invalid_payload_fails_without_scraping() {
    let p = pipeline(
        StubSource::new(vec![fixture(1, "A", "B")], vec![]),
        StubMatches::default(),
    );

    let payload = serde_json::json!({"limit": "not-a-number"});
    let result = p
        .handler
        .execute(JobContext::new(sync_job(Some(payload))))
        .await;

    assert!(matches!(result, HandlerResult::Failed(_)));
    assert_eq!(p.source.shutdowns.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unavailable_browser_retries_until_terminal() {
    let queue: Arc<MemoryJobQueue> = Arc::new(MemoryJobQueue::new());
    let p = pipeline(StubSource::unavailable(), StubMatches::default());

    let worker = JobWorker::new(queue.clone(), WorkerConfig::default().with_poll_interval(10));
    worker.register_handler(p.handler).await;

    let mut req = EnqueueRequest::new(JobType::FullSync);
    req.backoff_base_secs = 0;
    let job_id = queue.enqueue(req).await.unwrap();

    let handle = worker.start();
    let mut events = handle.events();

    let mut failures = 0;
    while failures < 3 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for failure events")
            .unwrap();
        if matches!(&event, WorkerEvent::JobFailed { job_id: id, .. } if *id == job_id) {
            failures += 1;
        }
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let job = queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, job.max_attempts);
    assert!(job
        .error_message
        .unwrap()
        .contains("Scrape source unavailable"));

    handle.shutdown().await.unwrap();
}
