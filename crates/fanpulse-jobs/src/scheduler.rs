//! Cron-style scheduler that enqueues synchronization jobs.
//!
//! One interval loop, one `full-sync` job per tick. An enqueue failure is
//! logged and the loop continues; the next tick tries again. After each
//! tick the queue's finished-job retention is enforced.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use fanpulse_core::{defaults, EnqueueRequest, Error, JobQueue, JobType, Result, SyncScope};

/// Configuration for the sync scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minutes between scheduled full syncs.
    pub interval_minutes: u64,
    /// Whether scheduled syncs are enabled.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: defaults::SYNC_INTERVAL_MINUTES,
            enabled: true,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SYNC_SCHEDULER_ENABLED` | `true` | Enable/disable scheduled syncs |
    /// | `SYNC_INTERVAL_MINUTES` | `60` | Minutes between full syncs |
    pub fn from_env() -> Self {
        let enabled = std::env::var("SYNC_SCHEDULER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let interval_minutes = std::env::var("SYNC_INTERVAL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SYNC_INTERVAL_MINUTES)
            .max(1);

        Self {
            interval_minutes,
            enabled,
        }
    }

    /// Set the sync interval in minutes.
    pub fn with_interval_minutes(mut self, minutes: u64) -> Self {
        self.interval_minutes = minutes.max(1);
        self
    }

    /// Enable or disable scheduled syncs.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    /// Signal the scheduler to shut down.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))
    }
}

/// Interval scheduler for full-sync jobs.
pub struct SyncScheduler {
    queue: Arc<dyn JobQueue>,
    config: SchedulerConfig,
}

impl SyncScheduler {
    /// Create a new scheduler over the shared queue.
    pub fn new(queue: Arc<dyn JobQueue>, config: SchedulerConfig) -> Self {
        Self { queue, config }
    }

    /// Start the scheduler loop and return a handle for control.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        SchedulerHandle { shutdown_tx }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Sync scheduler is disabled, not starting");
            return;
        }

        info!(
            interval_minutes = self.config.interval_minutes,
            "Sync scheduler started"
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.interval_minutes * 60));
        // The first tick of a tokio interval fires immediately; consume it
        // so startup does not race a `--sync-now` trigger.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Sync scheduler received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    async fn tick(&self) {
        match self.queue.enqueue(EnqueueRequest::new(JobType::FullSync)).await {
            Ok(job_id) => {
                info!(?job_id, "Scheduled full sync enqueued");
            }
            Err(e) => {
                // The loop keeps running; the next tick retries.
                error!(error = ?e, "Failed to enqueue scheduled full sync");
            }
        }

        match self.queue.cleanup(defaults::JOB_KEEP_COUNT).await {
            Ok(removed) if removed > 0 => {
                debug!(removed, "Evicted old finished jobs");
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = ?e, "Job retention cleanup failed");
            }
        }
    }
}

/// Enqueue an operator-triggered sync at manual priority.
pub async fn enqueue_manual_sync(queue: &dyn JobQueue, scope: SyncScope) -> Result<Uuid> {
    let payload = serde_json::to_value(&scope)?;
    let job_id = queue
        .enqueue(EnqueueRequest::new(JobType::ManualSync).with_payload(payload))
        .await?;
    info!(?job_id, ?scope, "Manual sync enqueued");
    Ok(job_id)
}
