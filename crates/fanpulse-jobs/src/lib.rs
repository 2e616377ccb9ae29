//! # fanpulse-jobs
//!
//! Background job processing for the FanPulse sync pipeline.
//!
//! This crate provides:
//! - A worker pool with bounded concurrency, per-job timeouts and panic
//!   isolation
//! - An interval scheduler that enqueues full-sync jobs
//! - The sync pipeline handler (scrape, persist, analyze, purge)
//! - An in-memory queue mirroring the Postgres queue semantics for tests
//!   and local development
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fanpulse_jobs::{JobWorker, WorkerConfig, NoOpHandler};
//! use fanpulse_jobs::memory::MemoryJobQueue;
//! use fanpulse_core::JobType;
//!
//! let queue = Arc::new(MemoryJobQueue::new());
//! let worker = JobWorker::new(queue, WorkerConfig::default());
//! worker.register_handler(NoOpHandler::new(&[JobType::FullSync])).await;
//!
//! let handle = worker.start();
//! // ...
//! handle.shutdown().await?;
//! ```

pub mod handler;
pub mod memory;
pub mod scheduler;
pub mod sync;
pub mod worker;

// Re-export core types
pub use fanpulse_core::*;

pub use handler::{HandlerResult, JobContext, JobHandler, NoOpHandler};
pub use memory::MemoryJobQueue;
pub use scheduler::{enqueue_manual_sync, SchedulerConfig, SchedulerHandle, SyncScheduler};
pub use sync::{SyncConfig, SyncHandler, HISTORICAL_TAG};
pub use worker::{JobWorker, WorkerConfig, WorkerEvent, WorkerHandle};
