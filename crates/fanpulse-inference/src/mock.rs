//! Mock inference backend for deterministic testing.
//!
//! Implements both backend traits with hash-seeded embeddings and canned
//! responses. Every call is logged so tests can assert on interaction
//! patterns, not just return values.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use fanpulse_core::{EmbeddingBackend, Error, GenerationBackend, Result, Vector};

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    mapped_responses: HashMap<String, String>,
    default_response: String,
    fail: bool,
}

/// One logged backend call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 768,
            mapped_responses: HashMap::new(),
            default_response: r#"{"summary": "Mock analysis"}"#.to_string(),
            fail: false,
        }
    }
}

impl MockInferenceBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Set the default generation response.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Respond with `output` whenever the prompt contains `needle`.
    pub fn with_response_mapping(
        mut self,
        needle: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .mapped_responses
            .insert(needle.into(), output.into());
        self
    }

    /// Make every call fail, for error-path testing.
    pub fn with_failure(mut self, fail: bool) -> Self {
        Arc::make_mut(&mut self.config).fail = fail;
        self
    }

    /// All logged calls.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of embed calls.
    pub fn embed_call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == "embed")
            .count()
    }

    /// Number of generation calls.
    pub fn generate_call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == "generate")
            .count()
    }

    /// Prompts passed to `generate`, in call order.
    pub fn generate_inputs(&self) -> Vec<String> {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == "generate")
            .map(|c| c.input.clone())
            .collect()
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
        });
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        for text in texts {
            self.log_call("embed", text);
        }
        if self.config.fail {
            return Err(Error::Embedding("Simulated embedding failure".into()));
        }
        Ok(texts
            .iter()
            .map(|t| Vector::from(deterministic_embedding(t, self.config.dimension)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[async_trait]
impl GenerationBackend for MockInferenceBackend {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String> {
        self.log_call("generate", prompt);
        if self.config.fail {
            return Err(Error::Inference("Simulated generation failure".into()));
        }

        for (needle, output) in &self.config.mapped_responses {
            if prompt.contains(needle.as_str()) {
                return Ok(output.clone());
            }
        }
        Ok(self.config.default_response.clone())
    }
}

/// Deterministic unit-norm embedding from text content.
fn deterministic_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vec = vec![0.0_f32; dimension];
    for (i, c) in text.chars().enumerate() {
        let idx = (c as usize + i) % dimension;
        vec[idx] += 0.1;
    }

    let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        vec.iter_mut().for_each(|x| *x /= magnitude);
    }
    vec
}
