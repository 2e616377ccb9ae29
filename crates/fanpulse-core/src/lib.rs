//! # fanpulse-core
//!
//! Core types, traits, and abstractions shared across the fanpulse
//! synchronization pipeline.
//!
//! This crate provides:
//! - The `Error`/`Result` pair used by every subsystem
//! - Domain models (jobs, fixtures, standings, knowledge records, analyses)
//! - The pure job state machine and backoff computation
//! - Repository and backend traits implemented by `fanpulse-db`,
//!   `fanpulse-feed`, `fanpulse-scraper`, and `fanpulse-inference`
//! - Centralized default constants and structured-logging field names

pub mod cache_key;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod state;
pub mod traits;

pub use cache_key::cache_key;
pub use error::{Error, Result};
pub use models::*;
pub use state::{backoff_delay, JobEvent, JobState};
pub use traits::*;

/// Generate a time-ordered UUIDv7 identifier.
///
/// v7 ids sort chronologically, which keeps job and knowledge-record
/// listings in insertion order without a secondary sort key.
pub fn new_v7() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}
