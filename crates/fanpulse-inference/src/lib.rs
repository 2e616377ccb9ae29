//! Inference layer for FanPulse.
//!
//! Provides the Ollama-backed generation and embedding backends, the
//! retrieval-augmented analysis client, the tolerant output parser, and a
//! deterministic mock backend for tests.

pub mod analysis;
pub mod mock;
pub mod ollama;
pub mod parse;

pub use analysis::{AnalysisClient, ANALYSIS_TAG};
pub use mock::MockInferenceBackend;
pub use ollama::OllamaBackend;
pub use parse::parse_analysis;
