//! Worker pool that drains the job queue.
//!
//! `worker_count` tasks poll the shared queue; each claims at most one job
//! at a time, so the pool bounds system concurrency. Handlers run in their
//! own spawned task under a timeout, which isolates panics and runaway jobs
//! from the polling loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use fanpulse_core::{defaults, Error, Job, JobQueue, JobType, Result};

use crate::handler::{HandlerResult, JobContext, JobHandler};

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Number of worker tasks; each runs one job at a time.
    pub worker_count: usize,
    /// Per-job execution timeout in seconds.
    pub job_timeout_secs: u64,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::JOB_POLL_INTERVAL_MS,
            worker_count: defaults::WORKER_COUNT,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_WORKER_COUNT` | `2` | Number of worker tasks |
    /// | `JOB_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty |
    /// | `JOB_TIMEOUT_SECS` | `1800` | Per-job execution timeout |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let worker_count = std::env::var("JOB_WORKER_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_COUNT)
            .max(1);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_POLL_INTERVAL_MS);

        let job_timeout_secs = std::env::var("JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_TIMEOUT_SECS);

        Self {
            poll_interval_ms,
            worker_count,
            job_timeout_secs,
            enabled,
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the number of worker tasks.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    /// Set the per-job timeout.
    pub fn with_job_timeout(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the worker pool.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A job was claimed and handed to its handler.
    JobStarted { job_id: Uuid, job_type: JobType },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, job_type: JobType },
    /// A job failed (it may still be retried by the queue).
    JobFailed {
        job_id: Uuid,
        job_type: JobType,
        error: String,
    },
    /// Worker pool started.
    WorkerStarted,
    /// Worker pool stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker pool.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the pool to shut down; in-flight jobs finish first.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Worker pool over a shared job queue.
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    config: WorkerConfig,
    handlers: Arc<RwLock<HashMap<JobType, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    /// Create a new worker pool.
    pub fn new(queue: Arc<dyn JobQueue>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            queue,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Register a handler for every job type it declares.
    pub async fn register_handler<H: JobHandler + 'static>(&self, handler: H) {
        let handler: Arc<dyn JobHandler> = Arc::new(handler);
        let mut handlers = self.handlers.write().await;
        for job_type in handler.job_types() {
            handlers.insert(*job_type, handler.clone());
            debug!(?job_type, "Registered job handler");
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the pool and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    async fn run(self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            worker_count = self.config.worker_count,
            "Job worker pool started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for worker_idx in 0..self.config.worker_count {
            let slot = WorkerSlot {
                queue: self.queue.clone(),
                handlers: self.handlers.clone(),
                event_tx: self.event_tx.clone(),
                poll_interval: Duration::from_millis(self.config.poll_interval_ms),
                job_timeout: Duration::from_secs(self.config.job_timeout_secs),
            };
            let stop_rx = stop_rx.clone();
            tasks.spawn(async move {
                slot.run(worker_idx, stop_rx).await;
            });
        }

        let _ = shutdown_rx.recv().await;
        info!("Job worker pool received shutdown signal");
        let _ = stop_tx.send(true);

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = ?e, "Worker task panicked");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker pool stopped");
    }
}

/// One polling slot of the pool; runs at most one job at a time.
struct WorkerSlot {
    queue: Arc<dyn JobQueue>,
    handlers: Arc<RwLock<HashMap<JobType, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl WorkerSlot {
    async fn run(&self, worker_idx: usize, mut stop_rx: watch::Receiver<bool>) {
        debug!(worker_idx, "Worker slot started");

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let job_types: Vec<JobType> = {
                let handlers = self.handlers.read().await;
                handlers.keys().copied().collect()
            };

            match self.queue.claim_next(&job_types).await {
                Ok(Some(job)) => {
                    self.execute_job(job).await;
                    // Queue was non-empty; poll again immediately.
                }
                Ok(None) => {
                    tokio::select! {
                        _ = stop_rx.changed() => break,
                        _ = sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(error = ?e, worker_idx, "Failed to claim job");
                    sleep(self.poll_interval).await;
                }
            }
        }

        debug!(worker_idx, "Worker slot stopped");
    }

    async fn execute_job(&self, job: Job) {
        let start = Instant::now();
        let job_id = job.id;
        let job_type = job.job_type;

        info!(?job_id, ?job_type, "Processing job");
        let _ = self
            .event_tx
            .send(WorkerEvent::JobStarted { job_id, job_type });

        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&job_type).cloned()
        };

        let result = match handler {
            Some(handler) => {
                // Run the handler in its own task so a panic is contained
                // and surfaces as a JoinError instead of killing this slot.
                let mut task = tokio::spawn(async move {
                    handler.execute(JobContext::new(job)).await
                });
                match tokio::time::timeout(self.job_timeout, &mut task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => {
                        error!(?job_id, ?job_type, error = ?join_err, "Job handler panicked");
                        HandlerResult::Failed(format!("Handler panicked: {join_err}"))
                    }
                    Err(_) => {
                        task.abort();
                        warn!(
                            ?job_id,
                            ?job_type,
                            timeout_secs = self.job_timeout.as_secs(),
                            "Job exceeded execution timeout"
                        );
                        HandlerResult::Failed(format!(
                            "Job exceeded timeout of {}s",
                            self.job_timeout.as_secs()
                        ))
                    }
                }
            }
            None => {
                warn!(?job_type, "No handler registered for job type");
                HandlerResult::Failed(format!("No handler for job type: {job_type:?}"))
            }
        };

        match result {
            HandlerResult::Success(result_data) => {
                if let Err(e) = self.queue.complete(job_id, result_data).await {
                    error!(error = ?e, ?job_id, "Failed to mark job as completed");
                } else {
                    info!(
                        ?job_id,
                        ?job_type,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job completed successfully"
                    );
                    let _ = self
                        .event_tx
                        .send(WorkerEvent::JobCompleted { job_id, job_type });
                }
            }
            HandlerResult::Failed(error) | HandlerResult::Retry(error) => {
                if let Err(e) = self.queue.fail(job_id, &error).await {
                    error!(error = ?e, ?job_id, "Failed to mark job as failed");
                } else {
                    warn!(
                        ?job_id,
                        ?job_type,
                        %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobFailed {
                        job_id,
                        job_type,
                        error,
                    });
                }
            }
        }
    }
}
