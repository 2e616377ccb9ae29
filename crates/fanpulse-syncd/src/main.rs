//! fanpulse-syncd - background synchronization daemon for FanPulse
//!
//! Wires the durable job queue, the sync scheduler, the worker pool and the
//! scrape/analyze pipeline together, then runs until ctrl-c. Shutdown order:
//! scheduler first (no new jobs), then workers (drain in-flight jobs), then
//! the browser, then the pool.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fanpulse_core::{FixtureSource, SyncScope};
use fanpulse_db::Database;
use fanpulse_feed::{FeedClient, FeedConfig, FeedSource};
use fanpulse_inference::{AnalysisClient, OllamaBackend};
use fanpulse_jobs::{
    enqueue_manual_sync, JobWorker, SchedulerConfig, SyncConfig, SyncHandler, SyncScheduler,
    WorkerConfig, WorkerEvent,
};
use fanpulse_scraper::{ScraperConfig, ScraperEngine};

/// How long shutdown waits for in-flight jobs before giving up.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   RUST_LOG    - standard env filter (default: "fanpulse_syncd=info,fanpulse_jobs=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fanpulse_syncd=info,fanpulse_jobs=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Connect to database and run pending migrations
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/fanpulse".to_string());
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    db.migrate().await?;
    info!("Database connected, migrations applied");

    // Fixture source: headless scraper by default, the sports-data API when
    // a token-holding deployment opts in with FANPULSE_SOURCE=feed.
    let source: Arc<dyn FixtureSource> = match std::env::var("FANPULSE_SOURCE").as_deref() {
        Ok("feed") => {
            let client = FeedClient::new(
                FeedConfig::from_env()?,
                Arc::new(db.cache.clone()),
                Arc::new(db.rate_budget.clone()),
            )?;
            info!(source = "feed", "Using sports-data API fixture source");
            Arc::new(FeedSource::new(client))
        }
        _ => {
            info!(source = "scrape", "Using headless scraper fixture source");
            Arc::new(ScraperEngine::new(ScraperConfig::from_env()?))
        }
    };

    // Inference stack: one Ollama backend serves embedding and generation.
    let ollama = Arc::new(OllamaBackend::from_env()?);
    let knowledge = Arc::new(db.knowledge.clone());
    let analysis = Arc::new(AnalysisClient::new(
        ollama.clone(),
        ollama.clone(),
        knowledge.clone(),
    ));

    let handler = SyncHandler::new(
        source.clone(),
        Arc::new(db.matches.clone()),
        knowledge,
        ollama,
        analysis,
        SyncConfig::default(),
    );

    let queue = Arc::new(db.jobs.clone());

    // Operator-triggered sync before the workers start claiming.
    if std::env::args().any(|arg| arg == "--sync-now") {
        let job_id = enqueue_manual_sync(queue.as_ref(), SyncScope::default()).await?;
        info!(%job_id, "Manual sync requested via --sync-now");
    }

    let worker = JobWorker::new(queue.clone(), WorkerConfig::from_env());
    worker.register_handler(handler).await;
    let worker_handle = worker.start();
    let mut worker_events = worker_handle.events();

    let scheduler = SyncScheduler::new(queue, SchedulerConfig::from_env());
    let scheduler_handle = scheduler.start();

    info!("fanpulse-syncd running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Stop producing before stopping consumers.
    if let Err(e) = scheduler_handle.shutdown().await {
        warn!(error = ?e, "Scheduler shutdown signal failed");
    }
    if let Err(e) = worker_handle.shutdown().await {
        warn!(error = ?e, "Worker shutdown signal failed");
    }

    // Wait for in-flight jobs to drain, bounded.
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        loop {
            match worker_events.recv().await {
                Ok(WorkerEvent::WorkerStopped) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "Workers did not drain in time, shutting down anyway"
        );
    }

    source.shutdown().await;
    db.pool.close().await;
    info!("fanpulse-syncd stopped");

    Ok(())
}
