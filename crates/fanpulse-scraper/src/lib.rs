//! Headless-browser scraping for FanPulse.
//!
//! The engine drives a shared headless Chrome with resource filtering and
//! politeness delays; HTML parsing is a pure module testable without a
//! browser.

pub mod engine;
pub mod parse;

pub use engine::{ScraperConfig, ScraperEngine};
