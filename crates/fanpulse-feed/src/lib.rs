//! Sports-data API client for FanPulse.
//!
//! Wraps the third-party feed behind a cache-aside, rate-budgeted client so
//! that concurrent sync workers share one cache and one request budget.

pub mod client;
pub mod endpoints;
pub mod source;

pub use client::{FeedClient, FeedConfig};
pub use endpoints::FeedEndpoint;
pub use source::FeedSource;
