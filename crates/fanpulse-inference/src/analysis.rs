//! Retrieval-augmented match analysis.
//!
//! The analysis client closes a feedback loop over the knowledge store:
//! each subject is embedded, prior similar records are retrieved into the
//! prompt, and the successful analysis is embedded and written back with an
//! expiry so the context stays fresh.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use tracing::{debug, info, instrument};

use fanpulse_core::{
    defaults, new_v7, AnalysisResult, EmbeddingBackend, Error, GenerationBackend, KnowledgeHit,
    KnowledgeRecord, KnowledgeRepository, Result,
};

use crate::parse::parse_analysis;

/// Knowledge tag carried by stored analyses.
pub const ANALYSIS_TAG: &str = "match_analysis";

const SYSTEM_PROMPT: &str = "\
You are a football match analyst. Respond with a single JSON object and \
nothing else, using exactly these fields: \
\"summary\" (string), \
\"insights\" (array of strings), \
\"tactical_analysis\" (string or null), \
\"prediction\" (object with \"outcome\" being one of \"home_win\", \
\"away_win\" or \"draw\", \"confidence\" between 0 and 1, and \
\"reasoning\", or null). \
Base your analysis only on the subject and the provided context.";

/// RAG analysis client over pluggable inference backends.
pub struct AnalysisClient {
    embedder: Arc<dyn EmbeddingBackend>,
    generator: Arc<dyn GenerationBackend>,
    knowledge: Arc<dyn KnowledgeRepository>,
    context_k: i64,
    ttl_days: i64,
}

impl AnalysisClient {
    /// Create a client with default retrieval depth and retention.
    pub fn new(
        embedder: Arc<dyn EmbeddingBackend>,
        generator: Arc<dyn GenerationBackend>,
        knowledge: Arc<dyn KnowledgeRepository>,
    ) -> Self {
        Self {
            embedder,
            generator,
            knowledge,
            context_k: defaults::ANALYSIS_CONTEXT_K,
            ttl_days: defaults::KNOWLEDGE_TTL_DAYS,
        }
    }

    /// Override how many prior records are retrieved into the prompt.
    pub fn with_context_k(mut self, k: i64) -> Self {
        self.context_k = k;
        self
    }

    /// Override the stored-analysis retention in days.
    pub fn with_ttl_days(mut self, days: i64) -> Self {
        self.ttl_days = days;
        self
    }

    /// Analyze `subject`, grounding the prompt in similar prior records.
    ///
    /// Backend failures (embedding, generation) propagate so the job layer
    /// can retry; malformed model output does not, it degrades to a result
    /// with `parse_error = true` which is returned but never stored.
    #[instrument(skip(self, subject), fields(subsystem = "inference", component = "analysis", op = "analyze", subject_len = subject.len()))]
    pub async fn analyze(&self, subject: &str) -> Result<AnalysisResult> {
        let query = self.embed_one(subject).await?;
        let hits = self.knowledge.search(&query, self.context_k).await?;
        debug!(result_count = hits.len(), "Retrieved analysis context");

        let prompt = compose_prompt(subject, &hits);
        let raw = self.generator.generate(SYSTEM_PROMPT, &prompt).await?;
        let result = parse_analysis(&raw);

        if !result.parse_error {
            self.store_analysis(subject, &result).await?;
        }

        info!(
            parse_error = result.parse_error,
            "Analysis complete"
        );
        Ok(result)
    }

    async fn embed_one(&self, text: &str) -> Result<fanpulse_core::Vector> {
        let mut vectors = self.embedder.embed_texts(&[text.to_string()]).await?;
        if vectors.is_empty() {
            return Err(Error::Embedding("Backend returned no embedding".into()));
        }
        Ok(vectors.remove(0))
    }

    async fn store_analysis(&self, subject: &str, result: &AnalysisResult) -> Result<()> {
        let text = format!("{}\n{}", subject, result.summary);
        let embedding = self.embed_one(&text).await?;
        let now = Utc::now();

        self.knowledge
            .upsert(&KnowledgeRecord {
                id: new_v7(),
                embedding,
                payload: json!({
                    "text": text,
                    "analysis": result,
                }),
                tag: ANALYSIS_TAG.to_string(),
                created_at: now,
                expires_at: Some(now + ChronoDuration::days(self.ttl_days)),
            })
            .await
    }
}

fn compose_prompt(subject: &str, hits: &[KnowledgeHit]) -> String {
    let mut prompt = String::new();

    if !hits.is_empty() {
        prompt.push_str("Context from prior analyses and historical data:\n");
        for hit in hits {
            let line = hit
                .payload
                .get("text")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| hit.payload.to_string());
            prompt.push_str(&format!("- [{}] {}\n", hit.tag, line));
        }
        prompt.push('\n');
    }

    prompt.push_str("Subject:\n");
    prompt.push_str(subject);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInferenceBackend;
    use async_trait::async_trait;
    use fanpulse_core::Vector;
    use std::sync::Mutex;

    struct StubKnowledge {
        hits: Vec<KnowledgeHit>,
        upserts: Mutex<Vec<KnowledgeRecord>>,
    }

    impl StubKnowledge {
        fn new(hits: Vec<KnowledgeHit>) -> Self {
            Self {
                hits,
                upserts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl KnowledgeRepository for StubKnowledge {
        async fn upsert(&self, record: &KnowledgeRecord) -> Result<()> {
            self.upserts.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn search(&self, _query: &Vector, k: i64) -> Result<Vec<KnowledgeHit>> {
            Ok(self.hits.iter().take(k as usize).cloned().collect())
        }

        async fn purge_expired(&self) -> Result<u64> {
            Ok(0)
        }
    }

    fn hit(text: &str, tag: &str) -> KnowledgeHit {
        KnowledgeHit {
            score: 0.9,
            payload: json!({ "text": text }),
            tag: tag.to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_analysis_is_stored_back() {
        let backend = Arc::new(
            MockInferenceBackend::new()
                .with_response(r#"{"summary": "Home side favored", "insights": ["strong form"]}"#),
        );
        let knowledge = Arc::new(StubKnowledge::new(vec![hit("past derby", ANALYSIS_TAG)]));
        let client = AnalysisClient::new(backend.clone(), backend.clone(), knowledge.clone());

        let result = client.analyze("Arsenal vs Chelsea").await.unwrap();

        assert!(!result.parse_error);
        assert_eq!(result.summary, "Home side favored");

        let stored = knowledge.upserts.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].tag, ANALYSIS_TAG);
        assert!(stored[0].expires_at.is_some());
        // Query embed + storage embed.
        assert_eq!(backend.embed_call_count(), 2);
    }

    #[tokio::test]
    async fn test_parse_failure_is_returned_not_stored() {
        let backend = Arc::new(MockInferenceBackend::new().with_response("model rambled instead"));
        let knowledge = Arc::new(StubKnowledge::new(vec![]));
        let client = AnalysisClient::new(backend.clone(), backend, knowledge.clone());

        let result = client.analyze("Leeds vs Burnley").await.unwrap();

        assert!(result.parse_error);
        assert_eq!(result.summary, "model rambled instead");
        assert!(knowledge.upserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_context_appears_in_prompt() {
        let backend = Arc::new(
            MockInferenceBackend::new()
                .with_response(r#"{"summary": "ok"}"#),
        );
        let knowledge = Arc::new(StubKnowledge::new(vec![hit(
            "Arsenal unbeaten in ten",
            "historical_data",
        )]));
        let client = AnalysisClient::new(backend.clone(), backend.clone(), knowledge);

        client.analyze("Arsenal vs Chelsea").await.unwrap();

        let prompts = backend.generate_inputs();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Arsenal unbeaten in ten"));
        assert!(prompts[0].contains("Subject:\nArsenal vs Chelsea"));
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let backend = Arc::new(MockInferenceBackend::new().with_failure(true));
        let knowledge = Arc::new(StubKnowledge::new(vec![]));
        let client = AnalysisClient::new(backend.clone(), backend, knowledge);

        let err = client.analyze("subject").await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }
}
