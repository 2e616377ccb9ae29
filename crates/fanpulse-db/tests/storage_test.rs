//! Integration tests for the Postgres storage layer.
//!
//! These run against a live database and skip themselves when
//! `DATABASE_URL` is not set. Each test uses unique keys/ids so reruns on a
//! dirty database stay independent.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use uuid::Uuid;

use fanpulse_core::{
    new_v7, AnalysisResult, CacheStore, EnqueueRequest, Fixture, JobQueue, JobStatus, JobType,
    KnowledgeRecord, KnowledgeRepository, MatchRepository, RateBudget, UpsertOutcome, Vector,
};
use fanpulse_db::{Database, PgRateBudget};

async fn test_db() -> Option<Database> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping storage test");
            return None;
        }
    };
    let db = Database::connect(&url)
        .await
        .expect("Failed to connect to test database");
    db.migrate().await.expect("Failed to run migrations");
    Some(db)
}

fn unit_vector(hot: usize) -> Vector {
    let mut values = vec![0.0f32; 768];
    values[hot % 768] = 1.0;
    Vector::from(values)
}

#[tokio::test]
async fn test_cache_round_trip_honors_ttl() {
    let Some(db) = test_db().await else { return };
    let key = format!("test-cache:{}", Uuid::now_v7());
    let value = json!({"fixtures": [1, 2, 3]});

    db.cache
        .set(&key, &value, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(db.cache.get(&key).await.unwrap(), Some(value.clone()));

    // Overwrite with a TTL that lapses immediately.
    db.cache
        .set(&key, &value, Duration::from_millis(50))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(db.cache.get(&key).await.unwrap(), None);

    db.cache.delete(&key).await.unwrap();
}

#[tokio::test]
async fn test_cache_delete_prefix_is_scoped() {
    let Some(db) = test_db().await else { return };
    let prefix = format!("test-prefix-{}:", Uuid::now_v7());
    let ttl = Duration::from_secs(60);

    db.cache
        .set(&format!("{prefix}a"), &json!(1), ttl)
        .await
        .unwrap();
    db.cache
        .set(&format!("{prefix}b"), &json!(2), ttl)
        .await
        .unwrap();
    let outside = format!("test-other:{}", Uuid::now_v7());
    db.cache.set(&outside, &json!(3), ttl).await.unwrap();

    let removed = db.cache.delete_prefix(&prefix).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(db.cache.get(&outside).await.unwrap(), Some(json!(3)));

    db.cache.delete(&outside).await.unwrap();
}

#[tokio::test]
async fn test_rate_budget_exhaustion_is_fail_fast() {
    let Some(db) = test_db().await else { return };

    // The budget table keys on window start; clear it so this test owns
    // the current window.
    sqlx::query("DELETE FROM rate_budget")
        .execute(&db.pool)
        .await
        .unwrap();

    let budget = PgRateBudget::with_limits(db.pool.clone(), 2, 3600);
    assert_eq!(budget.try_consume(1).await.unwrap(), 1);
    assert_eq!(budget.try_consume(1).await.unwrap(), 2);

    let err = budget.try_consume(1).await.unwrap_err();
    assert!(err.is_rate_limited());

    // Still exhausted; the failed attempt consumed nothing.
    let err = budget.try_consume(1).await.unwrap_err();
    match err {
        fanpulse_core::Error::RateLimitExceeded { consumed, limit } => {
            assert_eq!(consumed, 2);
            assert_eq!(limit, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_match_upsert_and_analysis_lifecycle() {
    let Some(db) = test_db().await else { return };
    let external_id = Utc::now().timestamp_micros();

    let fixture = Fixture {
        external_id,
        home_team: "Arsenal".to_string(),
        away_team: "Chelsea".to_string(),
        kickoff_at: Some(Utc::now() + ChronoDuration::days(3)),
        competition: Some("Premier League".to_string()),
    };
    assert_eq!(
        db.matches.upsert_fixture(&fixture).await.unwrap(),
        UpsertOutcome::Inserted
    );

    let rescheduled = Fixture {
        kickoff_at: Some(Utc::now() + ChronoDuration::days(4)),
        ..fixture
    };
    assert_eq!(
        db.matches.upsert_fixture(&rescheduled).await.unwrap(),
        UpsertOutcome::Updated
    );

    let pending = db.matches.list_unanalyzed(10_000).await.unwrap();
    let record = pending
        .iter()
        .find(|r| r.external_id == external_id)
        .expect("upserted match should await analysis");

    let analysis = AnalysisResult {
        summary: "Home side favored".to_string(),
        insights: vec!["strong form".to_string()],
        tactical_analysis: None,
        prediction: None,
        parse_error: false,
    };
    db.matches.set_analysis(record.id, &analysis).await.unwrap();

    let pending = db.matches.list_unanalyzed(10_000).await.unwrap();
    assert!(pending.iter().all(|r| r.external_id != external_id));
}

#[tokio::test]
async fn test_knowledge_purge_removes_only_past_expiry() {
    let Some(db) = test_db().await else { return };
    let now = Utc::now();
    let marker = Uuid::now_v7().to_string();

    let expired = KnowledgeRecord {
        id: new_v7(),
        embedding: unit_vector(now.timestamp_subsec_micros() as usize),
        payload: json!({"text": format!("expired {marker}")}),
        tag: "match_analysis".to_string(),
        created_at: now,
        expires_at: Some(now - ChronoDuration::days(1)),
    };
    let live = KnowledgeRecord {
        id: new_v7(),
        embedding: unit_vector(now.timestamp_subsec_micros() as usize + 1),
        payload: json!({"text": format!("live {marker}")}),
        tag: "match_analysis".to_string(),
        created_at: now,
        expires_at: Some(now + ChronoDuration::days(1)),
    };
    let evergreen = KnowledgeRecord {
        id: new_v7(),
        embedding: unit_vector(now.timestamp_subsec_micros() as usize + 2),
        payload: json!({"text": format!("evergreen {marker}")}),
        tag: "historical_data".to_string(),
        created_at: now,
        expires_at: None,
    };
    for record in [&expired, &live, &evergreen] {
        db.knowledge.upsert(record).await.unwrap();
    }

    let purged = db.knowledge.purge_expired().await.unwrap();
    assert!(purged >= 1);

    let pool = &db.pool;
    let exists = |id: Uuid| async move {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM knowledge_record WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
    };
    assert!(!exists(expired.id).await);
    assert!(exists(live.id).await);
    assert!(exists(evergreen.id).await);

    // The surviving record is retrievable by similarity.
    let hits = db.knowledge.search(&live.embedding, 10).await.unwrap();
    assert!(hits
        .iter()
        .any(|h| h.payload["text"] == json!(format!("live {marker}"))));
}

#[tokio::test]
async fn test_job_queue_claim_fail_backoff_complete() {
    let Some(db) = test_db().await else { return };

    // Claim order is global; start from an empty waiting set.
    sqlx::query("DELETE FROM sync_job WHERE status = 'waiting'")
        .execute(&db.pool)
        .await
        .unwrap();

    let urgent_id = db
        .jobs
        .enqueue(
            EnqueueRequest::new(JobType::ManualSync)
                .with_payload(json!({"limit": 5}))
                .with_priority(100),
        )
        .await
        .unwrap();
    let routine_id = db
        .jobs
        .enqueue(EnqueueRequest::new(JobType::FullSync))
        .await
        .unwrap();

    // Highest priority first.
    let claimed = db
        .jobs
        .claim_next(&[JobType::FullSync, JobType::ManualSync])
        .await
        .unwrap()
        .expect("a waiting job should be claimable");
    assert_eq!(claimed.id, urgent_id);
    assert_eq!(claimed.status, JobStatus::Active);
    assert!(claimed.started_at.is_some());

    // First failure requeues with a backoff delay.
    db.jobs.fail(urgent_id, "transient scrape error").await.unwrap();
    let failed = db.jobs.get(urgent_id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Waiting);
    assert_eq!(failed.attempts, 1);
    assert!(failed.run_after > Utc::now());
    assert_eq!(failed.error_message.as_deref(), Some("transient scrape error"));

    // The delayed job is ineligible, so the routine one is claimed next.
    let claimed = db
        .jobs
        .claim_next(&[JobType::FullSync, JobType::ManualSync])
        .await
        .unwrap()
        .expect("the routine job should be claimable");
    assert_eq!(claimed.id, routine_id);

    db.jobs
        .complete(routine_id, Some(json!({"scraped": 3})))
        .await
        .unwrap();
    let done = db.jobs.get(routine_id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.result.unwrap()["scraped"], 3);
    assert!(done.completed_at.is_some());

    let stats = db.jobs.stats().await.unwrap();
    assert!(stats.waiting >= 1);
    assert!(stats.completed >= 1);
}
