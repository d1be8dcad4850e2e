use pivot_core::topic::{parse_topic, topic_prompt, topic_schema, TopicExtractionResult};
use pivot_core::{Error, GenerateRequest, Result, TextGenerator};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TopicExtractorConfig {
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Ask the backend for schema-constrained JSON instead of free text.
    pub structured_output: bool,
    pub timeout_ms: u64,
}

impl Default for TopicExtractorConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 500,
            temperature: 0.5,
            structured_output: true,
            timeout_ms: 30_000,
        }
    }
}

/// Core subject + opposing keywords from article text, via one generator call.
#[derive(Clone)]
pub struct TopicExtractor {
    generator: Arc<dyn TextGenerator>,
    config: TopicExtractorConfig,
}

impl TopicExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>, config: TopicExtractorConfig) -> Self {
        Self { generator, config }
    }

    pub async fn extract(&self, article: &str) -> Result<TopicExtractionResult> {
        let mut req = GenerateRequest::new(
            topic_prompt(article),
            self.config.max_tokens,
            self.config.temperature,
        );
        req.model = self.config.model.clone();
        req.timeout_ms = Some(self.config.timeout_ms);
        if self.config.structured_output {
            req.json_schema = Some(topic_schema());
        }

        let provider = self.generator.name();
        let raw = tokio::time::timeout(
            Duration::from_millis(self.config.timeout_ms),
            self.generator.generate(&req),
        )
        .await
        .map_err(|_| Error::Timeout {
            provider: provider.to_string(),
            timeout_ms: self.config.timeout_ms,
        })??;

        let parsed = parse_topic(provider, &raw).inspect_err(|e| {
            tracing::error!(provider, error = %e, "topic extraction response rejected");
        })?;
        if parsed.opposing_terms.is_empty() {
            tracing::warn!(topic = %parsed.topic, "no opposing terms extracted; using topic-only queries");
        }
        tracing::info!(topic = %parsed.topic, opposing_terms = ?parsed.opposing_terms, "topic extracted");
        Ok(parsed)
    }
}
